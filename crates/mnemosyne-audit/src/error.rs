//! Error types surfaced by the audit engine.

use std::path::PathBuf;

use mnemosyne_core::ValidationError;
use mnemosyne_sanitizer::SanitizeError;
use mnemosyne_storage::StorageError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration error: configuration file not found: {}", path.display())]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The configuration file exists but could not be read.
    #[error("Configuration error: failed to read '{}': {source}", path.display())]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not match the schema.
    #[error("Configuration error: failed to parse YAML configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A `${NAME}` reference names an unset environment variable.
    #[error("Configuration error: environment variable '{name}' is not set but required in configuration")]
    MissingEnvVar {
        /// Variable name.
        name: String,
    },

    /// The configuration parsed but is semantically invalid.
    #[error("Configuration error: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

/// The errors a caller of the engine can see.
///
/// Anything else that goes wrong while logging is absorbed into the engine's
/// error counter.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Bad action, category, action type or timestamp.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The sanitizer failed and the event was dropped.
    #[error("{source} (event {event_id} was not stored to prevent PII leakage)")]
    Processing {
        /// Identifier of the dropped event.
        event_id: String,
        /// Sanitizer failure.
        #[source]
        source: SanitizeError,
    },

    /// Every configured backend failed to store the event.
    #[error("Storage error: All storage backends failed: {message}")]
    Storage {
        /// Each backend's failure, `label: error`, separated by `; `.
        message: String,
    },

    /// Configuration could not be loaded or applied.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A single backend used directly (ingestion) failed.
    #[error(transparent)]
    Backend(#[from] StorageError),
}

impl From<mnemosyne_core::Error> for AuditError {
    fn from(err: mnemosyne_core::Error) -> Self {
        match err {
            mnemosyne_core::Error::Validation(e) => Self::Validation(e),
            other => Self::Validation(ValidationError::format("event", other.to_string())),
        }
    }
}

impl AuditError {
    /// Returns true for input errors the caller must fix.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
