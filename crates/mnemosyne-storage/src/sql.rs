//! SQLite storage backend.

use std::path::PathBuf;

use mnemosyne_core::AuditEvent;
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::backend::StorageBackend;
use crate::error::{Result, StorageError};
use crate::schema::{Column, EventRow, INSERT_SQL, SCHEMA_SQL, TABLE_NAME};

/// Default database URL.
pub const DEFAULT_URL: &str = "sqlite:///audit.db";

/// Default page size for [`EventQuery`].
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Where a database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// A private in-memory database
    Memory,
    /// A database file
    File(PathBuf),
}

impl DatabaseTarget {
    /// Parses a database URL.
    ///
    /// Accepts `sqlite://` and `sqlite:///:memory:` (in-memory),
    /// `sqlite:///relative.db`, `sqlite:////absolute.db`, `:memory:`, or a
    /// bare file path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedUrl`] for any other scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(StorageError::UnsupportedUrl {
                url: url.to_string(),
            });
        }

        let path = if let Some(rest) = url.strip_prefix("sqlite://") {
            rest.strip_prefix('/').unwrap_or(rest)
        } else if url.contains("://") {
            return Err(StorageError::UnsupportedUrl {
                url: url.to_string(),
            });
        } else {
            url
        };

        Ok(match path {
            "" | ":memory:" => Self::Memory,
            path => Self::File(PathBuf::from(path)),
        })
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            Self::Memory => Connection::open_in_memory(),
            Self::File(path) => Connection::open(path),
        }
    }
}

/// Equality filters plus pagination over the events table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Column/value pairs that must all match
    pub filters: Vec<(Column, String)>,
    /// Maximum rows returned
    pub limit: usize,
    /// Rows skipped before the first returned row
    pub offset: usize,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
        }
    }
}

impl EventQuery {
    /// Creates an unfiltered query for the first page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn with_filter(mut self, column: Column, value: impl Into<String>) -> Self {
        self.filters.push((column, value.into()));
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the number of rows to skip.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn where_clause(&self, params: &mut Vec<SqlValue>) -> String {
        if self.filters.is_empty() {
            return String::new();
        }
        let conditions: Vec<String> = self
            .filters
            .iter()
            .map(|(column, value)| {
                params.push(SqlValue::Text(value.clone()));
                format!("{column} = ?{}", params.len())
            })
            .collect();
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

/// Persists events as rows of the shared `audit_events` table.
///
/// The connection is opened on construction, released by `close`, and
/// reopened on the next use. Reopening an in-memory database yields an empty
/// one.
#[derive(Debug)]
pub struct SqlBackend {
    url: String,
    target: DatabaseTarget,
    echo: bool,
    conn: Mutex<Option<Connection>>,
}

impl SqlBackend {
    /// Opens the database at `url` and creates the schema if missing.
    ///
    /// # Errors
    ///
    /// Returns an error for an unsupported URL or if the database cannot be
    /// opened or initialised.
    pub fn new(url: &str) -> Result<Self> {
        let target = DatabaseTarget::from_url(url)?;
        let backend = Self {
            url: url.to_string(),
            target,
            echo: false,
            conn: Mutex::new(None),
        };
        backend.with_connection(|_| Ok(()))?;
        info!(url = %backend.url, "SQL storage backend initialized");
        Ok(backend)
    }

    /// Opens an in-memory database.
    ///
    /// # Errors
    ///
    /// See [`SqlBackend::new`].
    pub fn in_memory() -> Result<Self> {
        Self::new("sqlite:///:memory:")
    }

    /// Logs every executed statement at debug level when `echo` is set.
    #[must_use]
    pub const fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Returns the configured URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns events matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored body is not valid JSON.
    pub fn query(&self, query: &EventQuery) -> Result<Vec<Value>> {
        let mut params = Vec::new();
        let where_clause = query.where_clause(&mut params);
        let sql = format!(
            "SELECT event_data FROM {TABLE_NAME}{where_clause} ORDER BY timestamp DESC LIMIT ?{} OFFSET ?{}",
            params.len() + 1,
            params.len() + 2
        );
        params.push(SqlValue::Integer(to_sql_int(query.limit)));
        params.push(SqlValue::Integer(to_sql_int(query.offset)));

        let bodies = self.with_connection(|conn| {
            self.echo_sql(&sql);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)
        })?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StorageError::from))
            .collect()
    }

    /// Looks up one event by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the stored body is not valid JSON.
    pub fn get_event(&self, event_id: &str) -> Result<Option<Value>> {
        let sql = format!("SELECT event_data FROM {TABLE_NAME} WHERE event_id = ?1");
        let body = self.with_connection(|conn| {
            self.echo_sql(&sql);
            conn.query_row(&sql, params![event_id], |row| row.get::<_, String>(0))
                .optional()
                .map_err(StorageError::from)
        })?;

        body.map(|body| serde_json::from_str(&body).map_err(StorageError::from))
            .transpose()
    }

    /// Counts events matching the filters of `query`, ignoring pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self, query: &EventQuery) -> Result<u64> {
        let mut params = Vec::new();
        let where_clause = query.where_clause(&mut params);
        let sql = format!("SELECT COUNT(*) FROM {TABLE_NAME}{where_clause}");

        let count = self.with_connection(|conn| {
            self.echo_sql(&sql);
            conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get::<_, i64>(0))
                .map_err(StorageError::from)
        })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = match guard.take() {
            Some(conn) => conn,
            None => {
                let conn = self.target.open()?;
                self.echo_sql(SCHEMA_SQL);
                conn.execute_batch(SCHEMA_SQL)?;
                debug!(url = %self.url, "Opened database connection");
                conn
            }
        };
        let result = f(&conn);
        *guard = Some(conn);
        result
    }

    fn echo_sql(&self, sql: &str) {
        if self.echo {
            debug!(url = %self.url, sql = sql.trim(), "Executing SQL");
        }
    }
}

fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl StorageBackend for SqlBackend {
    fn store(&self, event: &AuditEvent) -> Result<()> {
        let row = EventRow::from_event(event)?;
        self.with_connection(|conn| {
            self.echo_sql(INSERT_SQL);
            conn.execute(
                INSERT_SQL,
                params![
                    row.event_id,
                    row.timestamp,
                    row.version,
                    row.actor_type,
                    row.actor_username,
                    row.action_type,
                    row.action_category,
                    row.action_operation,
                    row.result_status,
                    row.application,
                    row.environment,
                    row.event_data,
                ],
            )?;
            Ok(())
        })
    }

    fn close(&self) {
        let Some(conn) = self.conn.lock().take() else {
            return;
        };
        match conn.close() {
            Ok(()) => info!(url = %self.url, "SQL storage backend closed"),
            Err((_, e)) => error!(url = %self.url, error = %e, "Error closing database connection"),
        }
    }
}
