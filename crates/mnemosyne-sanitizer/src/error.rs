//! Error types for PII sanitization.

use thiserror::Error;

/// Result type alias for sanitization operations.
pub type Result<T> = std::result::Result<T, SanitizeError>;

/// Processing failures raised by a sanitizer.
///
/// The engine treats every variant as a reason to refuse storage unless it
/// has been explicitly configured to fail open.
#[derive(Error, Debug)]
pub enum SanitizeError {
    /// A custom rule was registered with an empty pattern.
    #[error("Processing error: pattern cannot be empty (rule '{name}')")]
    EmptyPattern {
        /// Name of the rejected rule.
        name: String,
    },

    /// A custom rule's pattern failed to compile.
    #[error("Processing error: invalid regex pattern '{pattern}' for sanitization rule '{name}': {source}")]
    InvalidPattern {
        /// Name of the rejected rule.
        name: String,
        /// The pattern as supplied.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// A value nests deeper than the sanitizer is willing to walk.
    #[error("Processing error: '{field}' exceeds the maximum nesting depth of {max_depth}")]
    DepthExceeded {
        /// Top-level event field being sanitized.
        field: String,
        /// Configured depth limit.
        max_depth: usize,
    },

    /// A sanitizer implementation failed for another reason.
    #[error("Processing error: {reason}")]
    Failed {
        /// Reason for the failure.
        reason: String,
    },
}
