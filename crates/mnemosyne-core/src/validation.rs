//! Validation error type shared by every Mnemosyne crate.
//!
//! Validation failures are the "fail loud" kind: they always reach the
//! caller and always name the offending field.

use std::fmt;

/// A field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field or path that failed validation.
    pub field: String,
    /// A human-readable description of the validation failure.
    pub message: String,
    /// The kind of validation that failed.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Creates a new validation error.
    ///
    /// # Examples
    ///
    /// ```
    /// use mnemosyne_core::validation::{ValidationError, ValidationErrorKind};
    ///
    /// let error = ValidationError::new(
    ///     "action.category",
    ///     "Invalid category 'FOO'",
    ///     ValidationErrorKind::Constraint,
    /// );
    /// assert_eq!(error.field, "action.category");
    /// ```
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        kind: ValidationErrorKind,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind,
        }
    }

    /// Creates a validation error for a required field that is missing.
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("'{field}' is required but was not provided"),
            field,
            kind: ValidationErrorKind::Required,
        }
    }

    /// Creates a validation error for an invalid format.
    pub fn format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Format)
    }

    /// Creates a validation error for a value out of range.
    pub fn range(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Range)
    }

    /// Creates a validation error for an empty value.
    pub fn empty(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Empty)
    }

    /// Creates a validation error for a constraint violation.
    pub fn constraint(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, ValidationErrorKind::Constraint)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// The category of validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required field was not provided.
    Required,
    /// The value format is invalid.
    Format,
    /// The value is outside the allowed range.
    Range,
    /// The value is empty when it shouldn't be.
    Empty,
    /// The value is not a member of a closed set.
    Constraint,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Format => write!(f, "format"),
            Self::Range => write!(f, "range"),
            Self::Empty => write!(f, "empty"),
            Self::Constraint => write!(f, "constraint"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_required() {
        let error = ValidationError::required("action");
        assert_eq!(error.field, "action");
        assert_eq!(error.kind, ValidationErrorKind::Required);
        assert!(error.message.contains("required"));
    }

    #[test]
    fn test_validation_error_constructors_set_kind() {
        assert_eq!(
            ValidationError::format("a", "b").kind,
            ValidationErrorKind::Format
        );
        assert_eq!(
            ValidationError::range("a", "b").kind,
            ValidationErrorKind::Range
        );
        assert_eq!(
            ValidationError::empty("a", "b").kind,
            ValidationErrorKind::Empty
        );
        assert_eq!(
            ValidationError::constraint("a", "b").kind,
            ValidationErrorKind::Constraint
        );
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::format("timestamp", "invalid format");
        let display = format!("{error}");
        assert!(display.contains("timestamp"));
        assert!(display.contains("invalid format"));
    }

    #[test]
    fn test_validation_error_kind_display() {
        assert_eq!(ValidationErrorKind::Required.to_string(), "required");
        assert_eq!(ValidationErrorKind::Format.to_string(), "format");
        assert_eq!(ValidationErrorKind::Range.to_string(), "range");
        assert_eq!(ValidationErrorKind::Empty.to_string(), "empty");
        assert_eq!(ValidationErrorKind::Constraint.to_string(), "constraint");
    }
}
