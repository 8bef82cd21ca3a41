//! Error types for tally-core

use std::fmt;

use thiserror::Error;

/// Main error type for the tally-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Event data rejected before it was serialized
    #[error("illegal event data: {0}")]
    Validation(#[from] ValidationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport or sink failure
    #[error("delivery error: {0}")]
    Delivery(String),
}

/// Result type alias for tally-core
pub type Result<T> = std::result::Result<T, Error>;

/// Which input rule an event broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    EmptyDistinctId,
    DistinctIdTooLong,
    EmptyOriginalId,
    OriginalIdTooLong,
    InvalidEventName,
    InvalidPropertyKey,
    PropertyKeyNotString,
    PropertyValueInvalidType,
    PropertyValueTooLong,
    ListPropertyNotFlat,
    ListElementNotString,
    InvalidTimestamp,
}

/// A rejected event, with the rule it broke and a message naming the offending input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

impl Error {
    /// The validation rule behind this error, if it is a validation error.
    pub fn validation_kind(&self) -> Option<ValidationErrorKind> {
        match self {
            Error::Validation(e) => Some(e.kind),
            _ => None,
        }
    }
}
