//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid base URL: '{url}'")]
    InvalidBaseUrl { url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },

    #[error("Parse error in {path}: {msg}")]
    ParseError { path: String, msg: String },
}

/// Transport-level errors raised while talking to the game server.
///
/// Only [`NetworkError::is_transient`] errors are worth retrying; a
/// challenge page or a 4xx status will not change on a second attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("HTTP error {status_code} from {endpoint}")]
    HttpStatus { status_code: u16, endpoint: String },

    #[error("Automation challenge detected at {endpoint} (marker '{marker}')")]
    ChallengeDetected { endpoint: String, marker: String },
}

impl NetworkError {
    /// Timeouts, connection failures and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Timeout { .. } | NetworkError::ConnectionFailed { .. } => true,
            NetworkError::HttpStatus { status_code, .. } => *status_code >= 500,
            NetworkError::ChallengeDetected { .. } => false,
        }
    }

    pub fn is_challenge(&self) -> bool {
        matches!(self, NetworkError::ChallengeDetected { .. })
    }

    pub fn endpoint(&self) -> &str {
        match self {
            NetworkError::Timeout { endpoint, .. }
            | NetworkError::ConnectionFailed { endpoint, .. }
            | NetworkError::HttpStatus { endpoint, .. }
            | NetworkError::ChallengeDetected { endpoint, .. } => endpoint,
        }
    }
}
