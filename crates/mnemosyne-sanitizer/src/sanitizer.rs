//! PII sanitizer implementation.

use std::borrow::Cow;
use std::fmt::Debug;

use mnemosyne_core::{AuditEvent, Fields};
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, SanitizeError};
use crate::rules::{
    is_sensitive_key, SanitizationRule, BUILTIN_RULES, EMAIL_PATTERN, EMAIL_REDACTED, REDACTED,
};

/// Default limit on how deeply nested maps and sequences may be.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Redacts sensitive data from an event in place.
pub trait Sanitizer: Send + Sync + Debug {
    /// Sanitizes `event`.
    ///
    /// Implementations must leave the event untouched when they return an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns a [`SanitizeError`] if the event could not be fully sanitized.
    fn sanitize_event(&self, event: &mut AuditEvent) -> Result<()>;
}

/// Key- and pattern-based PII redaction.
///
/// Applied to `action.parameters`, `action.result.data`, `custom`,
/// `metadata`, `actor.email`, `error.message` and `error.stack_trace`. Identity, timestamp and
/// structural fields are never touched.
///
/// # Example
///
/// ```rust
/// use mnemosyne_sanitizer::PiiSanitizer;
/// use serde_json::json;
///
/// let sanitizer = PiiSanitizer::new();
/// let clean = sanitizer
///     .sanitize_value(&json!({"password": "secret123", "email": "a@b.com"}))
///     .unwrap();
///
/// assert_eq!(
///     clean,
///     json!({"password": "***REDACTED***", "email": "***EMAIL_REDACTED***"})
/// );
/// ```
#[derive(Debug)]
pub struct PiiSanitizer {
    rules: RwLock<Vec<SanitizationRule>>,
    email: Regex,
    max_depth: usize,
}

impl Default for PiiSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiSanitizer {
    /// Creates a sanitizer with the built-in rule set.
    #[must_use]
    pub fn new() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .map(|(name, pattern, replacement)| {
                SanitizationRule::new(*name, pattern, *replacement)
                    .expect("built-in sanitization pattern is valid")
            })
            .collect();

        Self {
            rules: RwLock::new(rules),
            email: Regex::new(EMAIL_PATTERN).expect("built-in email pattern is valid"),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the maximum nesting depth walked inside open maps.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Registers a custom rule, applied after the existing ones.
    ///
    /// # Errors
    ///
    /// Returns a processing error naming the pattern if it is empty or does
    /// not compile. The rule set is unchanged in that case.
    pub fn add_pattern(&self, pattern: &str, replacement: &str, name: &str) -> Result<()> {
        let rule = SanitizationRule::new(name, pattern, replacement)?;
        self.rules.write().push(rule);
        info!(rule = name, "Added custom sanitization pattern");
        Ok(())
    }

    /// Returns the number of pattern rules, excluding email redaction.
    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.rules.read().len()
    }

    /// Returns the rule names in application order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<String> {
        self.rules
            .read()
            .iter()
            .map(|rule| rule.name().to_string())
            .collect()
    }

    /// Applies every pattern rule in order, then email redaction.
    #[must_use]
    pub fn sanitize_string(&self, text: &str) -> String {
        let mut sanitized = text.to_string();
        for rule in self.rules.read().iter() {
            if let Cow::Owned(replaced) = rule.apply(&sanitized) {
                sanitized = replaced;
            }
        }
        self.sanitize_email(&sanitized)
    }

    /// Replaces every email address in `text` with a fixed marker.
    #[must_use]
    pub fn sanitize_email(&self, text: &str) -> String {
        self.email.replace_all(text, EMAIL_REDACTED).into_owned()
    }

    /// Sanitizes an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`SanitizeError::DepthExceeded`] when the value nests deeper
    /// than the configured limit.
    pub fn sanitize_value(&self, value: &Value) -> Result<Value> {
        self.walk(value, "value", 0)
    }

    /// Sanitizes an open map, naming `field` in any error.
    ///
    /// # Errors
    ///
    /// See [`PiiSanitizer::sanitize_value`].
    pub fn sanitize_fields(&self, fields: &Fields, field: &str) -> Result<Fields> {
        self.walk_map(fields, field, 0)
    }

    fn walk(&self, value: &Value, field: &str, depth: usize) -> Result<Value> {
        match value {
            Value::Object(map) => self.walk_map(map, field, depth).map(Value::Object),
            Value::Array(items) => {
                self.check_depth(field, depth)?;
                items
                    .iter()
                    .map(|item| self.walk(item, field, depth + 1))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
            Value::String(text) => Ok(Value::String(self.sanitize_string(text))),
            other => Ok(other.clone()),
        }
    }

    fn walk_map(&self, map: &Fields, field: &str, depth: usize) -> Result<Fields> {
        self.check_depth(field, depth)?;
        map.iter()
            .map(|(key, value)| {
                let clean = if is_sensitive_key(key) {
                    Value::String(REDACTED.to_string())
                } else {
                    self.walk(value, field, depth + 1)?
                };
                Ok((key.clone(), clean))
            })
            .collect()
    }

    fn check_depth(&self, field: &str, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(SanitizeError::DepthExceeded {
                field: field.to_string(),
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }
}

impl Sanitizer for PiiSanitizer {
    fn sanitize_event(&self, event: &mut AuditEvent) -> Result<()> {
        let parameters = self.sanitize_fields(&event.action.parameters, "action.parameters")?;
        let custom = self.sanitize_fields(&event.custom, "custom")?;
        let metadata = self.sanitize_fields(&event.metadata, "metadata")?;

        let data = event
            .action
            .result
            .data
            .as_ref()
            .map(|data| self.walk(data, "action.result.data", 0))
            .transpose()?;

        event.action.parameters = parameters;
        event.action.result.data = data;
        event.custom = custom;
        event.metadata = metadata;

        if let Some(email) = event.actor.email.as_deref() {
            event.actor.email = Some(self.sanitize_email(email));
        }
        if let Some(message) = event.error.message.as_deref() {
            event.error.message = Some(self.sanitize_string(message));
        }
        if let Some(trace) = event.error.stack_trace.as_deref() {
            event.error.stack_trace = Some(self.sanitize_string(trace));
        }

        debug!(event_id = event.event_id(), "Sanitized event");
        Ok(())
    }
}
