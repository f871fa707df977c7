//! Audit event definitions.
//!
//! An [`AuditEvent`] is built once (by the engine or from an external
//! payload), redacted in place by a sanitizer, and never modified after it
//! has been stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::{Timestamp, Uuid};

use crate::error::Result;
use crate::timestamp::{self, parse_timestamp, validate_timestamp};
use crate::validation::ValidationError;
use crate::vocabulary::{ActionCategory, ActionType, ResultStatus};

/// Open map of arbitrary nested JSON values.
pub type Fields = serde_json::Map<String, Value>;

/// Schema version stamped on newly created events.
pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

/// Generates a new v7 UUID for audit events.
fn new_event_id() -> String {
    let ts = Timestamp::now(uuid::NoContext);
    Uuid::new_v7(ts).to_string()
}

fn default_version() -> String {
    CURRENT_SCHEMA_VERSION.to_string()
}

/// Correlation identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionContext {
    /// Session identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Request identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Correlation ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Who performed the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorContext {
    /// Actor kind (`user`, `system`, `service`, `anonymous`)
    #[serde(rename = "type")]
    pub actor_type: String,

    /// Actor identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Username
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Email address (always redacted by the sanitizer)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Roles held by the actor
    pub roles: Vec<String>,

    /// Source IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Client user agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ActorContext {
    fn default() -> Self {
        Self {
            actor_type: "anonymous".to_string(),
            id: None,
            username: None,
            email: None,
            roles: Vec::new(),
            ip_address: None,
            user_agent: None,
        }
    }
}

/// The resource an action targeted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceInfo {
    /// Resource kind (`table`, `file`, `endpoint`, `function`)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    /// Resource identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Resource path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Outcome of an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResult {
    /// Result status
    pub status: ResultStatus,

    /// Application-specific result code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Result message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Rows affected by a database operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<i64>,

    /// Payload size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_size_bytes: Option<u64>,

    /// Captured return value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// What was done.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionContext {
    /// Action type
    #[serde(rename = "type")]
    pub action_type: ActionType,

    /// Action category
    pub category: ActionCategory,

    /// Operation name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    /// Targeted resource
    pub resource: ResourceInfo,

    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Operation parameters
    pub parameters: Fields,

    /// Operation result
    pub result: ActionResult,
}

/// Resource usage of an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceMetrics {
    /// Wall-clock duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,

    /// CPU time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_time_ms: Option<f64>,

    /// Memory used in megabytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,

    /// Whether a query exceeded the slow-query threshold
    pub slow_query: bool,

    /// Whether any performance threshold was exceeded
    pub threshold_exceeded: bool,
}

/// Error raised by the audited action, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorInfo {
    /// Whether an error occurred
    pub occurred: bool,

    /// Error type name
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// Error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Stack trace or error chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,

    /// Whether the error was handled by the caller
    pub handled: bool,
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self {
            occurred: false,
            error_type: None,
            message: None,
            stack_trace: None,
            handled: true,
        }
    }
}

/// A complete audit record.
///
/// # Examples
///
/// ```
/// use mnemosyne_core::{ActionCategory, AuditEvent};
///
/// let mut event = AuditEvent::new();
/// event.action.category = ActionCategory::Database;
///
/// let json = event.to_json().unwrap();
/// let restored = AuditEvent::from_json(&json).unwrap();
/// assert_eq!(restored.event_id(), event.event_id());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(default = "new_event_id")]
    event_id: String,

    #[serde(
        serialize_with = "timestamp::serialize",
        deserialize_with = "timestamp::deserialize",
        default = "Utc::now"
    )]
    timestamp: DateTime<Utc>,

    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,

    /// Correlation identifiers
    #[serde(default)]
    pub session: SessionContext,

    /// Who performed the action
    #[serde(default)]
    pub actor: ActorContext,

    /// What was done
    #[serde(default)]
    pub action: ActionContext,

    /// Resource usage
    #[serde(default)]
    pub performance: PerformanceMetrics,

    /// Error details
    #[serde(default)]
    pub error: ErrorInfo,

    /// Cached host and runtime facts
    #[serde(default)]
    pub system: Fields,

    /// Application-defined fields
    #[serde(default)]
    pub custom: Fields,

    /// Application and environment tags
    #[serde(default)]
    pub metadata: Fields,
}

impl Default for AuditEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditEvent {
    /// Creates an event with a fresh identifier stamped at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(new_event_id())
    }

    /// Creates an event with the given identifier.
    #[must_use]
    pub fn with_id(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp: Utc::now(),
            version: default_version(),
            session: SessionContext::default(),
            actor: ActorContext::default(),
            action: ActionContext::default(),
            performance: PerformanceMetrics::default(),
            error: ErrorInfo::default(),
            system: Fields::new(),
            custom: Fields::new(),
            metadata: Fields::new(),
        }
    }

    /// Sets the event timestamp.
    ///
    /// # Errors
    ///
    /// Returns a range error if `ts` is more than one hour in the future or
    /// more than 100 years in the past.
    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> std::result::Result<Self, ValidationError> {
        validate_timestamp(ts)?;
        self.timestamp = ts;
        Ok(self)
    }

    /// Returns the event identifier.
    #[must_use]
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Converts the event to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be represented as JSON (for
    /// example a non-finite float).
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Converts the event to a JSON object map.
    ///
    /// Absent optional fields are omitted.
    ///
    /// # Errors
    ///
    /// See [`AuditEvent::to_value`].
    pub fn to_map(&self) -> Result<Fields> {
        match self.to_value()? {
            Value::Object(map) => Ok(map),
            other => Err(ValidationError::format(
                "event",
                format!("event serialized to a non-object value: {other}"),
            )
            .into()),
        }
    }

    /// Serializes the event to compact JSON.
    ///
    /// # Errors
    ///
    /// See [`AuditEvent::to_value`].
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the event to indented JSON.
    ///
    /// # Errors
    ///
    /// See [`AuditEvent::to_value`].
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds an event from a JSON object map.
    ///
    /// Missing fields take their defaults and unknown fields are ignored. The
    /// timestamp is parsed and bounds-checked against the current time.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed or out-of-range timestamp or
    /// an out-of-vocabulary category/type, and a serialization error when a
    /// field has the wrong shape.
    pub fn from_map(mut map: Fields) -> Result<Self> {
        let timestamp = match map.remove("timestamp") {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => {
                let ts = parse_timestamp(&raw)?;
                validate_timestamp(ts)?;
                Some(ts)
            }
            Some(other) => {
                return Err(ValidationError::format(
                    "timestamp",
                    format!("timestamp must be an ISO-8601 string, got {other}"),
                )
                .into())
            }
        };

        let mut event: Self = serde_json::from_value(Value::Object(map))?;
        if let Some(ts) = timestamp {
            event.timestamp = ts;
        }
        Ok(event)
    }

    /// Builds an event from a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// See [`AuditEvent::from_map`].
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(ValidationError::format(
                "event",
                format!("event payload must be a JSON object, got {other}"),
            )
            .into()),
        }
    }

    /// Parses an event from JSON text.
    ///
    /// # Errors
    ///
    /// See [`AuditEvent::from_map`].
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn sample_event() -> AuditEvent {
        let mut event = AuditEvent::new();
        event.action.category = ActionCategory::Database;
        event.action.action_type = ActionType::Read;
        event.action.operation = Some("query_users".to_string());
        event.action.parameters.insert("table".into(), json!("users"));
        event.actor.username = Some("alice".to_string());
        event.actor.roles = vec!["admin".to_string()];
        event.custom.insert("nested".into(), json!({"a": [1, 2, {"b": null}]}));
        event
    }

    #[test]
    fn test_new_event_defaults() {
        let event = AuditEvent::new();

        assert_eq!(event.event_id().len(), 36);
        assert_eq!(event.version, "1.0.0");
        assert_eq!(event.actor.actor_type, "anonymous");
        assert_eq!(event.action.action_type, ActionType::Execute);
        assert_eq!(event.action.category, ActionCategory::System);
        assert_eq!(event.action.result.status, ResultStatus::Success);
        assert!(!event.error.occurred);
        assert!(event.error.handled);
        assert!(!event.performance.slow_query);
    }

    #[test]
    fn test_event_ids_are_unique() {
        assert_ne!(AuditEvent::new().event_id(), AuditEvent::new().event_id());
    }

    #[test]
    fn test_to_map_omits_absent_optionals() {
        let map = AuditEvent::new().to_map().unwrap();

        for key in [
            "event_id", "timestamp", "version", "session", "actor", "action", "performance",
            "error", "system", "custom", "metadata",
        ] {
            assert!(map.contains_key(key), "missing {key}");
        }

        assert_eq!(map["session"], json!({}));
        assert_eq!(map["actor"], json!({"type": "anonymous", "roles": []}));
        assert_eq!(map["error"], json!({"occurred": false, "handled": true}));
        assert!(map["action"].get("operation").is_none());
        assert_eq!(map["action"]["resource"], json!({}));
        assert_eq!(map["action"]["result"], json!({"status": "SUCCESS"}));
    }

    #[test]
    fn test_round_trip_preserves_identity_and_content() {
        let event = sample_event();
        let restored = AuditEvent::from_map(event.to_map().unwrap()).unwrap();

        assert_eq!(restored.event_id(), event.event_id());
        assert_eq!(restored.actor, event.actor);
        assert_eq!(restored.action, event.action);
        assert_eq!(restored.custom, event.custom);
        assert_eq!(restored.timestamp(), event.timestamp());
    }

    #[test]
    fn test_json_round_trip() {
        let event = sample_event();
        let restored = AuditEvent::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(restored, event);

        let pretty = event.to_json_pretty().unwrap();
        assert!(pretty.contains('\n'));
        assert_eq!(AuditEvent::from_json(&pretty).unwrap(), event);
    }

    #[test]
    fn test_serde_deserialize_keeps_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let event = sample_event().with_timestamp(ts).unwrap();

        let restored: AuditEvent = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(restored.timestamp(), ts);
        assert_eq!(restored, event);
    }

    #[test]
    fn test_serde_deserialize_checks_timestamp() {
        let future = (Utc::now() + Duration::hours(2)).to_rfc3339();
        let err = serde_json::from_value::<AuditEvent>(json!({"timestamp": future})).unwrap_err();
        assert!(err.to_string().contains("too far in the future"));

        assert!(serde_json::from_value::<AuditEvent>(json!({"timestamp": "yesterday"})).is_err());

        let event: AuditEvent = serde_json::from_value(json!({"timestamp": null})).unwrap();
        assert!(event.timestamp() <= Utc::now());
    }

    #[test]
    fn test_from_map_ignores_unknown_fields_and_fills_defaults() {
        let event = AuditEvent::from_value(json!({
            "event_id": "evt-1",
            "timestamp": "2024-01-15T10:30:00Z",
            "unexpected": true,
            "action": {"type": "write", "category": "file", "bogus": 1}
        }))
        .unwrap();

        assert_eq!(event.event_id(), "evt-1");
        assert_eq!(event.action.action_type, ActionType::Write);
        assert_eq!(event.action.category, ActionCategory::File);
        assert_eq!(event.actor.actor_type, "anonymous");
        assert_eq!(
            event.timestamp(),
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_from_map_generates_missing_id() {
        let event = AuditEvent::from_value(json!({})).unwrap();
        assert_eq!(event.event_id().len(), 36);
    }

    #[test]
    fn test_from_map_rejects_bad_timestamps() {
        let err = AuditEvent::from_value(json!({"timestamp": "yesterday"})).unwrap_err();
        assert!(err.to_string().contains("Invalid timestamp format"));

        let future = Utc::now() + Duration::hours(2);
        let err = AuditEvent::from_value(json!({"timestamp": future.to_rfc3339()})).unwrap_err();
        assert!(err.to_string().contains("too far in the future"));

        let ancient = Utc::now() - Duration::days(365 * 101);
        let err = AuditEvent::from_value(json!({"timestamp": ancient.to_rfc3339()})).unwrap_err();
        assert!(err.to_string().contains("too far in the past"));

        let err = AuditEvent::from_value(json!({"timestamp": 12345})).unwrap_err();
        assert!(err.as_validation().is_some());
    }

    #[test]
    fn test_from_map_rejects_unknown_category() {
        let err = AuditEvent::from_value(json!({"action": {"category": "MAGIC"}})).unwrap_err();
        assert!(err.to_string().contains("Valid categories"));
    }

    #[test]
    fn test_from_value_requires_object() {
        let err = AuditEvent::from_value(json!([1, 2])).unwrap_err();
        assert!(err.as_validation().is_some());
    }

    #[test]
    fn test_with_timestamp_bounds() {
        let past = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let event = AuditEvent::new().with_timestamp(past).unwrap();
        assert_eq!(event.timestamp(), past);

        assert!(AuditEvent::new()
            .with_timestamp(Utc::now() + Duration::days(1))
            .is_err());
    }

    #[test]
    fn test_serialized_timestamp_uses_offset() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let event = AuditEvent::with_id("x").with_timestamp(ts).unwrap();
        let map = event.to_map().unwrap();
        assert_eq!(map["timestamp"], json!("2024-01-15T10:30:00+00:00"));
    }
}
