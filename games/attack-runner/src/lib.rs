//! # Attack Runner
//!
//! Submits attack, support and scout commands to a browser strategy game
//! server on behalf of a logged-in session.
//!
//! ## Components
//!
//! - [`transport`] - spaced, retrying, caching HTTP client with interceptors
//! - [`token`] - per-location authentication tokens
//! - [`inventory`] - per-location unit counts and request validation
//! - [`submission`] - the two-phase prepare/confirm state machine
//! - [`queue`] - sequential batch processing with jittered pacing
//! - [`extract`] - ordered extraction strategies over response markup
//! - [`pipeline`] - builds all of the above from a [`RunnerConfig`]

pub mod config;
pub mod error;
pub mod extract;
pub mod inventory;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod queue;
pub mod submission;
pub mod token;
pub mod transport;
pub mod units;

pub use config::RunnerConfig;
pub use error::{AttackError, FailureKind, Phase};
pub use extract::ResponseExtractor;
pub use inventory::{InventoryCache, ValidationReport};
pub use model::{AttackRequest, AttackResult, CommandType, Coordinates, LocationId, TroopMap, WorldBounds};
pub use pipeline::AttackPipeline;
pub use plan::AttackPlan;
pub use queue::{BatchSummary, HaltReason, QueueOptions, QueueProcessor, QueueStatus};
pub use submission::{Submission, SubmissionEngine, SubmissionState};
pub use token::{PageContext, TokenManager};
pub use transport::{RequestOptions, Target, TransportClient};
pub use units::TravelCalculator;
