//! On-disk renderings of an audit event.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use mnemosyne_core::timestamp::format_timestamp;
use mnemosyne_core::AuditEvent;

use crate::error::{Result, StorageError};

/// Columns of the flattened CSV projection, in output order.
pub const CSV_COLUMNS: [&str; 12] = [
    "event_id",
    "timestamp",
    "category",
    "action_type",
    "operation",
    "username",
    "ip_address",
    "duration_ms",
    "status",
    "error_occurred",
    "error_type",
    "error_message",
];

const TEXT_DELIMITER: &str =
    "================================================================================";

/// Output format of the file backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Compact JSON lines
    Jsonl,
    /// Flattened comma-separated rows with a header
    Csv,
    /// Human-readable blocks
    Text,
    /// A format name this backend does not know; every write fails
    Unsupported(String),
}

impl FileFormat {
    /// Returns the configured name of the format.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Json => "json",
            Self::Jsonl => "jsonl",
            Self::Csv => "csv",
            Self::Text => "text",
            Self::Unsupported(name) => name,
        }
    }

    /// Parses a format name, case-insensitively.
    ///
    /// Unknown names become [`FileFormat::Unsupported`] so the failure
    /// surfaces on the first write rather than at startup.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "json" => Self::Json,
            "jsonl" => Self::Jsonl,
            "csv" => Self::Csv,
            "text" => Self::Text,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Renders one event record, including its trailing newline.
    ///
    /// `with_header` only affects CSV.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedFormat`] for an unknown format and a
    /// serialization error if the event cannot be encoded.
    pub fn render(&self, event: &AuditEvent, with_header: bool) -> Result<String> {
        match self {
            Self::Json | Self::Jsonl => {
                let mut line = event.to_json()?;
                line.push('\n');
                Ok(line)
            }
            Self::Csv => {
                let mut out = String::new();
                if with_header {
                    out.push_str(&CSV_COLUMNS.join(","));
                    out.push('\n');
                }
                let row: Vec<String> = csv_row(event).iter().map(|v| csv_escape(v)).collect();
                out.push_str(&row.join(","));
                out.push('\n');
                Ok(out)
            }
            Self::Text => Ok(text_block(event)),
            Self::Unsupported(name) => Err(StorageError::UnsupportedFormat {
                format: name.clone(),
            }),
        }
    }
}

impl FromStr for FileFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn csv_row(event: &AuditEvent) -> [String; 12] {
    let opt = |v: Option<&String>| v.cloned().unwrap_or_default();
    let error = &event.error;

    [
        event.event_id().to_string(),
        format_timestamp(&event.timestamp()),
        event.action.category.to_string(),
        event.action.action_type.to_string(),
        opt(event.action.operation.as_ref()),
        opt(event.actor.username.as_ref()),
        opt(event.actor.ip_address.as_ref()),
        event
            .performance
            .duration_ms
            .map(|d| d.to_string())
            .unwrap_or_default(),
        event.action.result.status.to_string(),
        error.occurred.to_string(),
        opt(error.error_type.as_ref().filter(|_| error.occurred)),
        opt(error.message.as_ref().filter(|_| error.occurred)),
    ]
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn text_block(event: &AuditEvent) -> String {
    let action = &event.action;
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "\n{TEXT_DELIMITER}");
    let _ = writeln!(out, "Event ID: {}", event.event_id());
    let _ = writeln!(out, "Timestamp: {}", format_timestamp(&event.timestamp()));
    let _ = writeln!(out, "Category: {}", action.category);
    let _ = writeln!(out, "Action: {}", action.operation.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "Type: {}", action.action_type);

    if let Some(username) = event.actor.username.as_deref().filter(|u| !u.is_empty()) {
        let _ = writeln!(out, "User: {username}");
    }
    if !action.parameters.is_empty() {
        let params = serde_json::Value::Object(action.parameters.clone());
        let _ = writeln!(out, "Parameters: {params}");
    }
    if let Some(duration) = event.performance.duration_ms.filter(|d| *d != 0.0) {
        let _ = writeln!(out, "Duration: {duration:.2}ms");
    }
    let _ = writeln!(out, "Status: {}", action.result.status);

    if event.error.occurred {
        let _ = writeln!(
            out,
            "\nERROR: {}: {}",
            event.error.error_type.as_deref().unwrap_or("-"),
            event.error.message.as_deref().unwrap_or("-")
        );
        if let Some(trace) = event.error.stack_trace.as_deref() {
            let _ = writeln!(out, "Stack Trace:\n{trace}");
        }
    }

    let _ = writeln!(out, "{TEXT_DELIMITER}");
    out
}
