//! Closed vocabularies for action categories, action types and result status.
//!
//! Every value is normalized to its upper-case form on input. Anything outside
//! the vocabulary is rejected with an error that lists the valid set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Category of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionCategory {
    /// Database access
    Database,
    /// API call
    Api,
    /// Authentication
    Auth,
    /// File system access
    File,
    /// System operation
    #[default]
    System,
    /// Network operation
    Network,
    /// Security-relevant operation
    Security,
    /// Compliance check or report
    Compliance,
    /// End-user activity
    User,
    /// Administrative activity
    Admin,
}

impl ActionCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Database,
        Self::Api,
        Self::Auth,
        Self::File,
        Self::System,
        Self::Network,
        Self::Security,
        Self::Compliance,
        Self::User,
        Self::Admin,
    ];

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Database => "DATABASE",
            Self::Api => "API",
            Self::Auth => "AUTH",
            Self::File => "FILE",
            Self::System => "SYSTEM",
            Self::Network => "NETWORK",
            Self::Security => "SECURITY",
            Self::Compliance => "COMPLIANCE",
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

/// Type of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionType {
    /// Read data
    Read,
    /// Write data
    Write,
    /// Update data
    Update,
    /// Delete data
    Delete,
    /// Execute an operation
    #[default]
    Execute,
    /// Create a resource
    Create,
    /// Log in
    Login,
    /// Log out
    Logout,
    /// Access a resource
    Access,
    /// Modify a resource
    Modify,
    /// Grant a permission
    Grant,
    /// Revoke a permission
    Revoke,
    /// Approve a request
    Approve,
    /// Reject a request
    Reject,
}

impl ActionType {
    /// Every action type, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::Read,
        Self::Write,
        Self::Update,
        Self::Delete,
        Self::Execute,
        Self::Create,
        Self::Login,
        Self::Logout,
        Self::Access,
        Self::Modify,
        Self::Grant,
        Self::Revoke,
        Self::Approve,
        Self::Reject,
    ];

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Execute => "EXECUTE",
            Self::Create => "CREATE",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Access => "ACCESS",
            Self::Modify => "MODIFY",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        }
    }
}

/// Outcome status of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResultStatus {
    /// The action succeeded
    #[default]
    Success,
    /// The action failed
    Failure,
    /// The action partially succeeded
    Partial,
}

impl ResultStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 3] = [Self::Success, Self::Failure, Self::Partial];

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Partial => "PARTIAL",
        }
    }
}

fn joined(names: impl Iterator<Item = &'static str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// Looks up `input` in a closed set after upper-casing it.
fn lookup<T: Copy>(
    input: &str,
    all: &[T],
    name_of: fn(T) -> &'static str,
    field: &str,
    label: &str,
) -> Result<T, ValidationError> {
    let valid = || joined(all.iter().map(|v| name_of(*v)));

    if input.is_empty() {
        return Err(ValidationError::empty(
            field,
            format!("{field} cannot be empty. Valid {label}: {}", valid()),
        ));
    }

    let upper = input.to_uppercase();
    all.iter()
        .copied()
        .find(|v| name_of(*v) == upper)
        .ok_or_else(|| {
            ValidationError::constraint(
                field,
                format!("Invalid {field} '{input}'. Valid {label}: {}", valid()),
            )
        })
}

impl FromStr for ActionCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s, &Self::ALL, Self::as_str, "category", "categories")
    }
}

impl FromStr for ActionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s, &Self::ALL, Self::as_str, "action_type", "types")
    }
}

impl FromStr for ResultStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s, &Self::ALL, Self::as_str, "status", "statuses")
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.as_str().to_string()
            }
        }
    )*};
}

string_conversions!(ActionCategory, ActionType, ResultStatus);

/// Validates and normalizes an action category.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every valid category when `category`
/// is empty or not a (case-insensitive) member of the vocabulary.
///
/// # Examples
///
/// ```
/// use mnemosyne_core::validate_category;
///
/// assert_eq!(validate_category("database").unwrap(), "DATABASE");
/// assert!(validate_category("nope").is_err());
/// ```
pub fn validate_category(category: &str) -> Result<String, ValidationError> {
    category
        .parse::<ActionCategory>()
        .map(|c| c.as_str().to_string())
}

/// Validates and normalizes an action type.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every valid type when `action_type`
/// is empty or not a (case-insensitive) member of the vocabulary.
pub fn validate_action_type(action_type: &str) -> Result<String, ValidationError> {
    action_type
        .parse::<ActionType>()
        .map(|t| t.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    #[test]
    fn test_validate_category_normalizes_case() {
        assert_eq!(validate_category("database").unwrap(), "DATABASE");
        assert_eq!(validate_category("Api").unwrap(), "API");
        assert_eq!(validate_category("SYSTEM").unwrap(), "SYSTEM");
    }

    #[test]
    fn test_validate_category_rejects_unknown() {
        let err = validate_category("INVALID").unwrap_err();
        assert_eq!(err.field, "category");
        assert_eq!(err.kind, ValidationErrorKind::Constraint);
        assert!(err.message.contains("Invalid category 'INVALID'"));
        for category in ActionCategory::ALL {
            assert!(err.message.contains(category.as_str()));
        }
    }

    #[test]
    fn test_validate_category_rejects_empty_and_names_valid_set() {
        let err = validate_category("").unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Empty);
        assert!(err.message.contains("DATABASE"));
    }

    #[test]
    fn test_validate_category_rejects_odd_inputs() {
        let long = "a".repeat(1000);
        for input in ["123", "数据库", "DATA BASE", " API", long.as_str()] {
            assert!(validate_category(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_validate_action_type() {
        assert_eq!(validate_action_type("read").unwrap(), "READ");
        assert_eq!(validate_action_type("LoGiN").unwrap(), "LOGIN");

        let err = validate_action_type("QUERY").unwrap_err();
        assert_eq!(err.field, "action_type");
        assert!(err.message.contains("Valid types: READ, WRITE"));
    }

    #[test]
    fn test_vocabulary_sizes() {
        assert_eq!(ActionCategory::ALL.len(), 10);
        assert_eq!(ActionType::ALL.len(), 14);
    }

    #[test]
    fn test_serde_uses_upper_case_and_accepts_any_case() {
        let json = serde_json::to_string(&ActionCategory::Database).unwrap();
        assert_eq!(json, "\"DATABASE\"");

        let parsed: ActionType = serde_json::from_str("\"delete\"").unwrap();
        assert_eq!(parsed, ActionType::Delete);

        let status: ResultStatus = serde_json::from_str("\"partial\"").unwrap();
        assert_eq!(status, ResultStatus::Partial);

        assert!(serde_json::from_str::<ActionCategory>("\"BOGUS\"").is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ActionCategory::default(), ActionCategory::System);
        assert_eq!(ActionType::default(), ActionType::Execute);
        assert_eq!(ResultStatus::default(), ResultStatus::Success);
    }
}
