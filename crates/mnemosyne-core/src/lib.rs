//! # Mnemosyne Core
//!
//! Core types for the Mnemosyne audit logging platform.
//!
//! This crate provides the data model every other Mnemosyne crate builds on:
//!
//! - [`AuditEvent`] - the unit of record, with its nested value objects
//! - [`ActionCategory`] / [`ActionType`] - closed vocabularies, normalized to upper case
//! - [`validate_category`] / [`validate_action_type`] - vocabulary validation
//! - [`timestamp`] - ISO-8601 parsing and bounds checking
//!
//! ## Example
//!
//! ```rust
//! use mnemosyne_core::{validate_category, AuditEvent};
//! use serde_json::json;
//!
//! assert_eq!(validate_category("auth").unwrap(), "AUTH");
//!
//! let event = AuditEvent::from_value(json!({
//!     "timestamp": "2024-01-15T10:30:00Z",
//!     "action": {"type": "login", "category": "auth", "operation": "user_login"}
//! }))
//! .unwrap();
//! assert_eq!(event.action.category.as_str(), "AUTH");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod timestamp;
pub mod validation;
pub mod vocabulary;


pub use error::{Error, Result};
pub use event::{
    ActionContext, ActionResult, ActorContext, AuditEvent, ErrorInfo, Fields, PerformanceMetrics,
    ResourceInfo, SessionContext, CURRENT_SCHEMA_VERSION,
};
pub use validation::{ValidationError, ValidationErrorKind};
pub use vocabulary::{
    validate_action_type, validate_category, ActionCategory, ActionType, ResultStatus,
};
