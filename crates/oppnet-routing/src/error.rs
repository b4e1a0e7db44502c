//! Routing error types

use std::fmt::Display;

use oppnet_core::{MessageError, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Family of a decision engine
///
/// Engines only cooperate with peers running the same family; a
/// cross-family query is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    SprayAndFocus,
    PeopleRank,
    PeopleRank2,
    DistributedPeopleRank,
}

impl Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineKind::SprayAndFocus => "spray-and-focus",
            EngineKind::PeopleRank => "people-rank",
            EngineKind::PeopleRank2 => "people-rank2",
            EngineKind::DistributedPeopleRank => "distributed-people-rank",
        };
        f.write_str(name)
    }
}

/// Errors raised by decision engines
///
/// None of these are retried. A failing call aborts only the decision
/// it belongs to.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Peer runs a different engine family
    #[error("Peer {peer} runs {found}, expected {expected}")]
    ProtocolMismatch {
        peer: String,
        expected: EngineKind,
        found: EngineKind,
    },

    /// Message lacks a property the engine attaches on creation
    #[error("Message {message} has no '{property}' property")]
    MissingProtocolMetadata { message: String, property: String },

    /// Operation is not provided by this engine
    #[error("{engine} does not support {operation}")]
    UnsupportedOperation {
        engine: EngineKind,
        operation: &'static str,
    },

    /// No engine is installed for the peer
    #[error("No engine installed for peer {peer}")]
    UnknownPeer { peer: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),
}

impl RoutingError {
    /// Check whether this error comes from peers running different engines
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(self, RoutingError::ProtocolMismatch { .. })
    }
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_mismatch_display() {
        let err = RoutingError::ProtocolMismatch {
            peer: "B".to_string(),
            expected: EngineKind::SprayAndFocus,
            found: EngineKind::PeopleRank,
        };
        let msg = err.to_string();
        assert!(msg.contains("spray-and-focus"));
        assert!(msg.contains("people-rank"));
        assert!(err.is_protocol_mismatch());
    }

    #[test]
    fn test_unsupported_display() {
        let err = RoutingError::UnsupportedOperation {
            engine: EngineKind::DistributedPeopleRank,
            operation: "update",
        };
        assert_eq!(err.to_string(), "distributed-people-rank does not support update");
        assert!(!err.is_protocol_mismatch());
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: RoutingError = StorageError::MessageNotFound("M1".into()).into();
        assert!(matches!(err, RoutingError::Storage(_)));
    }
}
