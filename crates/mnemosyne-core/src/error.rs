//! Error types for Mnemosyne core operations.
//!
//! This module defines the error types used throughout the `mnemosyne-core` crate.

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or decoding audit events.
#[derive(Error, Debug)]
pub enum Error {
    /// A field failed validation (vocabulary, timestamp bounds, shape).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns the validation error if this is a validation failure.
    #[must_use]
    pub const fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Serialization(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation_is_transparent() {
        let err: Error = ValidationError::format("timestamp", "not ISO-8601").into();
        assert_eq!(
            err.to_string(),
            "validation error for 'timestamp': not ISO-8601"
        );
        assert!(err.as_validation().is_some());
    }

    #[test]
    fn test_error_display_serialization() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(source);
        assert!(err.to_string().starts_with("Serialization error:"));
        assert!(err.as_validation().is_none());
    }
}
