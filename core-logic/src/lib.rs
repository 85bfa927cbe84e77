//! # Core Logic - Shared Utilities for the Attack Runner
//!
//! This crate provides the ambient stack shared by the game-facing crates:
//! typed errors, retry with backoff, request spacing, logging, metrics and
//! the HTTP backend seam.
//!
//! ## Modules
//!
//! - [`config`] - HTTP transport settings and TOML loading
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Attack and request metrics collection
//! - [`traits`] - The [`HttpBackend`] seam and its request/response types
//! - `utils` - Retry, spacing, logger and shutdown helpers

// Module declarations - internal modules marked pub(crate)
pub mod config;
pub mod error;
pub mod metrics;
pub mod traits;
pub(crate) mod utils;

// Selective exports - only public API types
pub use config::{load_toml, HttpConfig};
pub use error::{ConfigError, NetworkError};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use traits::{HttpBackend, HttpMethod, OutgoingRequest, RawResponse};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{setup_logger, shutdown_signal, RequestSpacer, RESULT_TARGET};

// Export retry utilities for testing
pub use utils::retry::{with_retry, RetryConfig, Retryable};
