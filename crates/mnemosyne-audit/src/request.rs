//! Arguments to [`AuditEngine::log`](crate::AuditEngine::log).

use mnemosyne_core::Fields;
use serde_json::Value;

/// Describes one action to audit.
///
/// The category and action type are kept as text and validated by the engine
/// so that a bad value surfaces as a validation error from `log`. Sub-objects
/// (`actor`, `session`, `resource`, `result`, `performance`, `error`) are JSON
/// objects merged onto the event's defaults; one that does not match the
/// event schema makes `log` return `Ok(None)` and counts as an engine error.
///
/// # Example
///
/// ```rust
/// use mnemosyne_audit::LogRequest;
/// use serde_json::json;
///
/// let request = LogRequest::new("user_login")
///     .with_category("auth")
///     .with_action_type("login")
///     .with_actor(json!({"type": "user", "username": "alice"}))
///     .with_parameter("method", json!("password"));
///
/// assert_eq!(request.action(), "user_login");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LogRequest {
    pub(crate) action: String,
    pub(crate) category: String,
    pub(crate) action_type: String,
    pub(crate) description: Option<String>,
    pub(crate) actor: Option<Value>,
    pub(crate) session: Option<Value>,
    pub(crate) resource: Option<Value>,
    pub(crate) result: Option<Value>,
    pub(crate) performance: Option<Value>,
    pub(crate) error: Option<Value>,
    pub(crate) parameters: Fields,
    pub(crate) custom: Fields,
    pub(crate) metadata: Fields,
}

impl LogRequest {
    /// Creates a request for `action` in category `SYSTEM` with type `EXECUTE`.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            category: "SYSTEM".to_string(),
            action_type: "EXECUTE".to_string(),
            description: None,
            actor: None,
            session: None,
            resource: None,
            result: None,
            performance: None,
            error: None,
            parameters: Fields::new(),
            custom: Fields::new(),
            metadata: Fields::new(),
        }
    }

    /// Returns the action (operation) name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Sets the category (any case).
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets the action type (any case).
    #[must_use]
    pub fn with_action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = action_type.into();
        self
    }

    /// Sets a free-text description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the actor object.
    #[must_use]
    pub fn with_actor(mut self, actor: Value) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Sets the session object.
    #[must_use]
    pub fn with_session(mut self, session: Value) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets the resource object.
    #[must_use]
    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Sets the result object.
    #[must_use]
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// Sets the performance object.
    #[must_use]
    pub fn with_performance(mut self, performance: Value) -> Self {
        self.performance = Some(performance);
        self
    }

    /// Sets the error object.
    #[must_use]
    pub fn with_error(mut self, error: Value) -> Self {
        self.error = Some(error);
        self
    }

    /// Replaces the action parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Fields) -> Self {
        self.parameters = parameters;
        self
    }

    /// Adds one action parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Replaces the custom fields.
    #[must_use]
    pub fn with_custom(mut self, custom: Fields) -> Self {
        self.custom = custom;
        self
    }

    /// Adds one custom field.
    #[must_use]
    pub fn with_custom_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// Replaces the metadata. `application` and `environment` are always
    /// overwritten by the engine.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Fields) -> Self {
        self.metadata = metadata;
        self
    }

    /// Adds one metadata field.
    #[must_use]
    pub fn with_metadata_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let request = LogRequest::new("sync");
        assert_eq!(request.category, "SYSTEM");
        assert_eq!(request.action_type, "EXECUTE");
        assert!(request.actor.is_none());
        assert!(request.parameters.is_empty());
    }

    #[test]
    fn test_builder_accumulates_fields() {
        let request = LogRequest::new("export")
            .with_parameter("format", json!("csv"))
            .with_parameter("rows", json!(10))
            .with_custom_field("ticket", json!("OPS-1"))
            .with_metadata_field("region", json!("eu"));

        assert_eq!(request.parameters.len(), 2);
        assert_eq!(request.custom["ticket"], "OPS-1");
        assert_eq!(request.metadata["region"], "eu");
    }
}
