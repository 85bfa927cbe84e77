//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

// Internal modules - not part of public API
pub(crate) mod logger;
pub(crate) mod rate_limiter;
pub(crate) mod retry;
pub(crate) mod shutdown;

// Selective exports - only public utilities
pub use logger::{setup_logger, RESULT_TARGET};
pub use rate_limiter::RequestSpacer;
pub use shutdown::shutdown_signal;
