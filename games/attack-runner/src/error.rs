//! Error taxonomy for the attack pipeline.

use crate::model::LocationId;
use core_logic::{ConfigError, NetworkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which half of the two-phase submission an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Prepare,
    Confirm,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => write!(f, "prepare"),
            Phase::Confirm => write!(f, "confirm"),
        }
    }
}

/// Coarse classification stored alongside failed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Timeout,
    HttpStatus,
    ChallengeDetected,
    Validation,
    TokenUnavailable,
    ServerRejected,
    UnexpectedResponse,
    StateViolation,
    LocationBusy,
    Internal,
}

#[derive(Error, Debug, Clone)]
pub enum AttackError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("{phase} request failed: {source}")]
    Transport {
        phase: Phase,
        #[source]
        source: NetworkError,
    },

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("No authentication token available for location {location_id}")]
    TokenUnavailable { location_id: LocationId },

    #[error("Rejected during {phase}: {reason}")]
    ServerRejected { phase: Phase, reason: String },

    #[error("Unexpected {phase} response: {detail}")]
    UnexpectedResponse { phase: Phase, detail: String },

    #[error("Invalid submission state: cannot {operation} while {state}")]
    StateViolation {
        operation: &'static str,
        state: &'static str,
    },

    #[error("A submission is already in progress for location {location_id}")]
    LocationBusy { location_id: LocationId },

    #[error("The queue is already being processed")]
    QueueBusy,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AttackError {
    pub fn validation(message: impl Into<String>) -> Self {
        AttackError::Validation(vec![message.into()])
    }

    fn network_source(&self) -> Option<&NetworkError> {
        match self {
            AttackError::Network(source) | AttackError::Transport { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Challenge pages abort the whole batch.
    pub fn is_challenge(&self) -> bool {
        self.network_source().is_some_and(NetworkError::is_challenge)
    }

    /// Failures that may succeed if the whole two-phase operation is re-run.
    pub fn is_transport(&self) -> bool {
        self.network_source().is_some_and(|e| !e.is_challenge())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AttackError::Network(source) | AttackError::Transport { source, .. } => match source {
                NetworkError::Timeout { .. } => FailureKind::Timeout,
                NetworkError::ConnectionFailed { .. } => FailureKind::Network,
                NetworkError::HttpStatus { .. } => FailureKind::HttpStatus,
                NetworkError::ChallengeDetected { .. } => FailureKind::ChallengeDetected,
            },
            AttackError::Validation(_) => FailureKind::Validation,
            AttackError::TokenUnavailable { .. } => FailureKind::TokenUnavailable,
            AttackError::ServerRejected { .. } => FailureKind::ServerRejected,
            AttackError::UnexpectedResponse { .. } => FailureKind::UnexpectedResponse,
            AttackError::StateViolation { .. } => FailureKind::StateViolation,
            AttackError::LocationBusy { .. } => FailureKind::LocationBusy,
            AttackError::QueueBusy | AttackError::Config(_) => FailureKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_keeps_phase_and_source() {
        let err = AttackError::Transport {
            phase: Phase::Confirm,
            source: NetworkError::Timeout {
                timeout_ms: 30000,
                endpoint: "game.php".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "confirm request failed: Request timeout after 30000ms to game.php"
        );
        assert!(err.is_transport());
        assert!(!err.is_challenge());
        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[test]
    fn test_challenge_is_not_a_plain_transport_failure() {
        let err = AttackError::from(NetworkError::ChallengeDetected {
            endpoint: "game.php".to_string(),
            marker: "bot_check".to_string(),
        });
        assert!(err.is_challenge());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_validation_joins_all_reasons() {
        let err = AttackError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Validation failed: a; b");
        assert_eq!(err.kind(), FailureKind::Validation);
    }
}
