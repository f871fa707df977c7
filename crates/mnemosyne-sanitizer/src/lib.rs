//! # Mnemosyne Sanitizer
//!
//! Redacts personally identifiable information from audit events before they
//! reach storage.
//!
//! Two mechanisms are applied to open maps:
//!
//! - values under sensitive keys (`password`, `token`, ...) are replaced
//!   wholesale with [`REDACTED`]
//! - every other string is passed through the ordered pattern rules and then
//!   email redaction
//!
//! ## Example
//!
//! ```rust
//! use mnemosyne_core::AuditEvent;
//! use mnemosyne_sanitizer::{PiiSanitizer, Sanitizer};
//! use serde_json::json;
//!
//! let mut event = AuditEvent::new();
//! event.action.parameters.insert("api_token".into(), json!("abc"));
//!
//! PiiSanitizer::new().sanitize_event(&mut event).unwrap();
//! assert_eq!(event.action.parameters["api_token"], "***REDACTED***");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod rules;
mod sanitizer;

#[cfg(test)]
mod proptest_tests;

pub use error::{Result, SanitizeError};
pub use rules::{is_sensitive_key, SanitizationRule, EMAIL_REDACTED, REDACTED, SENSITIVE_KEYS};
pub use sanitizer::{PiiSanitizer, Sanitizer, DEFAULT_MAX_DEPTH};
