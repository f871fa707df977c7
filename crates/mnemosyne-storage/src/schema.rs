//! The `audit_events` table.
//!
//! This is the only definition of the table. The SQL backend and the
//! ingestion path both write through it, so their rows always agree.

use std::fmt;

use chrono::SecondsFormat;
use mnemosyne_core::AuditEvent;
use serde_json::Value;

use crate::error::Result;

/// Name of the events table.
pub const TABLE_NAME: &str = "audit_events";

/// Statements creating the table and its indexes. Safe to run repeatedly.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS audit_events (
    event_id         TEXT PRIMARY KEY NOT NULL,
    timestamp        TEXT NOT NULL,
    version          TEXT NOT NULL DEFAULT '1.0.0',
    actor_type       TEXT,
    actor_username   TEXT,
    action_type      TEXT,
    action_category  TEXT,
    action_operation TEXT,
    result_status    TEXT,
    application      TEXT,
    environment      TEXT,
    event_data       TEXT NOT NULL,
    created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
CREATE INDEX IF NOT EXISTS ix_audit_events_timestamp ON audit_events (timestamp);
CREATE INDEX IF NOT EXISTS ix_audit_events_actor_username ON audit_events (actor_username);
CREATE INDEX IF NOT EXISTS ix_audit_events_action_category ON audit_events (action_category);
CREATE INDEX IF NOT EXISTS ix_audit_events_action_type ON audit_events (action_type);
CREATE INDEX IF NOT EXISTS ix_audit_events_result_status ON audit_events (result_status);
CREATE INDEX IF NOT EXISTS ix_audit_events_application ON audit_events (application);
CREATE INDEX IF NOT EXISTS ix_audit_events_environment ON audit_events (environment);
";

/// Insert statement matching [`EventRow`] field order.
pub const INSERT_SQL: &str = "INSERT INTO audit_events (\
    event_id, timestamp, version, actor_type, actor_username, action_type, \
    action_category, action_operation, result_status, application, environment, event_data\
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

/// Projection columns that queries may filter on by equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// `event_id`
    EventId,
    /// `version`
    Version,
    /// `actor_type`
    ActorType,
    /// `actor_username`
    ActorUsername,
    /// `action_type`
    ActionType,
    /// `action_category`
    ActionCategory,
    /// `action_operation`
    ActionOperation,
    /// `result_status`
    ResultStatus,
    /// `application`
    Application,
    /// `environment`
    Environment,
}

impl Column {
    /// Every filterable column.
    pub const ALL: [Self; 10] = [
        Self::EventId,
        Self::Version,
        Self::ActorType,
        Self::ActorUsername,
        Self::ActionType,
        Self::ActionCategory,
        Self::ActionOperation,
        Self::ResultStatus,
        Self::Application,
        Self::Environment,
    ];

    /// Returns the SQL column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventId => "event_id",
            Self::Version => "version",
            Self::ActorType => "actor_type",
            Self::ActorUsername => "actor_username",
            Self::ActionType => "action_type",
            Self::ActionCategory => "action_category",
            Self::ActionOperation => "action_operation",
            Self::ResultStatus => "result_status",
            Self::Application => "application",
            Self::Environment => "environment",
        }
    }

    /// Looks a column up by its SQL name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `audit_events` row projected from an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    /// Primary key
    pub event_id: String,
    /// Fixed-width UTC timestamp, sortable as text
    pub timestamp: String,
    /// Schema version
    pub version: String,
    /// Actor type
    pub actor_type: Option<String>,
    /// Actor username
    pub actor_username: Option<String>,
    /// Action type
    pub action_type: Option<String>,
    /// Action category
    pub action_category: Option<String>,
    /// Operation name
    pub action_operation: Option<String>,
    /// Result status
    pub result_status: Option<String>,
    /// `metadata.application`
    pub application: Option<String>,
    /// `metadata.environment`
    pub environment: Option<String>,
    /// The full serialized event
    pub event_data: String,
}

impl EventRow {
    /// Projects an event into a row.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the event cannot be encoded.
    pub fn from_event(event: &AuditEvent) -> Result<Self> {
        let metadata_str = |key: &str| {
            event
                .metadata
                .get(key)
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };

        Ok(Self {
            event_id: event.event_id().to_string(),
            timestamp: event
                .timestamp()
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            version: event.version.clone(),
            actor_type: Some(event.actor.actor_type.clone()),
            actor_username: event.actor.username.clone(),
            action_type: Some(event.action.action_type.to_string()),
            action_category: Some(event.action.category.to_string()),
            action_operation: event.action.operation.clone(),
            result_status: Some(event.action.result.status.to_string()),
            application: metadata_str("application"),
            environment: metadata_str("environment"),
            event_data: event.to_json()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mnemosyne_core::{ActionCategory, ActionType};
    use serde_json::json;

    #[test]
    fn test_column_names_round_trip() {
        for column in Column::ALL {
            assert_eq!(Column::from_name(column.as_str()), Some(column));
        }
        assert_eq!(Column::from_name("event_data"), None);
        assert_eq!(Column::from_name("1=1; DROP TABLE audit_events"), None);
    }

    #[test]
    fn test_row_projection() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let mut event = AuditEvent::with_id("evt-7").with_timestamp(ts).unwrap();
        event.actor.username = Some("alice".into());
        event.action.action_type = ActionType::Delete;
        event.action.category = ActionCategory::Database;
        event.action.operation = Some("drop_user".into());
        event.metadata.insert("application".into(), json!("billing"));
        event.metadata.insert("environment".into(), json!("staging"));

        let row = EventRow::from_event(&event).unwrap();
        assert_eq!(row.event_id, "evt-7");
        assert_eq!(row.timestamp, "2024-01-15T10:30:00.000000Z");
        assert_eq!(row.version, "1.0.0");
        assert_eq!(row.actor_type.as_deref(), Some("anonymous"));
        assert_eq!(row.actor_username.as_deref(), Some("alice"));
        assert_eq!(row.action_type.as_deref(), Some("DELETE"));
        assert_eq!(row.action_category.as_deref(), Some("DATABASE"));
        assert_eq!(row.action_operation.as_deref(), Some("drop_user"));
        assert_eq!(row.result_status.as_deref(), Some("SUCCESS"));
        assert_eq!(row.application.as_deref(), Some("billing"));
        assert_eq!(row.environment.as_deref(), Some("staging"));

        let body: Value = serde_json::from_str(&row.event_data).unwrap();
        assert_eq!(body["event_id"], "evt-7");
    }
}
