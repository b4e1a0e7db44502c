//! Error types for oppnet core

use thiserror::Error;

/// Errors related to node identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Identity out of range: {0}")]
    OutOfRange(String),
}

/// Errors related to message storage
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Buffer capacity exceeded (message size: {size}, capacity: {capacity})")]
    CapacityExceeded { size: usize, capacity: usize },

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Message already stored: {0}")]
    Duplicate(String),
}

/// Errors related to message properties
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Message {message} already has property '{key}'")]
    PropertyExists { message: String, key: String },

    #[error("Property '{key}' of message {message} is not of type {expected}")]
    PropertyType {
        message: String,
        key: String,
        expected: &'static str,
    },
}
