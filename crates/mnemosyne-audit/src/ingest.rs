//! Ingestion of events produced elsewhere.
//!
//! An [`EventIngestor`] accepts already-built events as JSON (for example
//! from a collector service), runs them through the same sanitizer contract
//! as the engine, and persists them to SQL. It also exposes the read side of
//! that store.

use std::sync::Arc;

use mnemosyne_core::{AuditEvent, ValidationError};
use mnemosyne_sanitizer::{PiiSanitizer, Sanitizer};
use mnemosyne_storage::{EventQuery, SqlBackend, StorageBackend};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{AuditError, Result};

/// Largest batch [`EventIngestor::ingest_batch`] accepts.
pub const MAX_BATCH_SIZE: usize = 100;

/// One rejected entry of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// Position of the entry in the submitted batch
    pub index: usize,
    /// Why it was rejected
    pub error: String,
}

/// Per-event outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Identifiers of stored events, in submission order
    pub accepted: Vec<String>,
    /// Entries that were not stored
    pub errors: Vec<BatchFailure>,
}

/// Sanitizes and stores externally produced events.
#[derive(Debug)]
pub struct EventIngestor {
    sanitizer: Arc<dyn Sanitizer>,
    store: SqlBackend,
}

impl EventIngestor {
    /// Creates an ingestor over `store` with the default PII sanitizer.
    #[must_use]
    pub fn new(store: SqlBackend) -> Self {
        Self {
            sanitizer: Arc::new(PiiSanitizer::new()),
            store,
        }
    }

    /// Replaces the sanitizer.
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &SqlBackend {
        &self.store
    }

    /// Ingests one event and returns its identifier.
    ///
    /// The payload must be a JSON object with an `action` section. Missing
    /// `event_id` and `timestamp` are generated.
    ///
    /// # Errors
    ///
    /// - [`AuditError::Validation`] for a malformed payload
    /// - [`AuditError::Processing`] if sanitization fails; nothing is stored
    /// - [`AuditError::Backend`] if the insert fails
    pub fn ingest(&self, payload: Value) -> Result<String> {
        let Value::Object(map) = payload else {
            return Err(ValidationError::format("event", "event payload must be a JSON object").into());
        };
        if !map.get("action").is_some_and(Value::is_object) {
            return Err(ValidationError::required("action").into());
        }

        let mut event = AuditEvent::from_map(map)?;

        if let Err(source) = self.sanitizer.sanitize_event(&mut event) {
            error!(event_id = event.event_id(), error = %source, "Failed to sanitize ingested event");
            return Err(AuditError::Processing {
                event_id: event.event_id().to_string(),
                source,
            });
        }

        self.store.store(&event)?;
        debug!(event_id = event.event_id(), "Ingested event");
        Ok(event.event_id().to_string())
    }

    /// Ingests up to [`MAX_BATCH_SIZE`] events, each independently.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the batch is empty or too large. Failures
    /// of individual entries are reported in the outcome instead.
    pub fn ingest_batch(&self, payloads: Vec<Value>) -> Result<BatchOutcome> {
        if payloads.is_empty() || payloads.len() > MAX_BATCH_SIZE {
            return Err(ValidationError::range(
                "events",
                format!(
                    "batch must contain between 1 and {MAX_BATCH_SIZE} events, got {}",
                    payloads.len()
                ),
            )
            .into());
        }

        let mut outcome = BatchOutcome::default();
        for (index, payload) in payloads.into_iter().enumerate() {
            match self.ingest(payload) {
                Ok(id) => outcome.accepted.push(id),
                Err(e) => outcome.errors.push(BatchFailure {
                    index,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            accepted = outcome.accepted.len(),
            rejected = outcome.errors.len(),
            "Ingested batch"
        );
        Ok(outcome)
    }

    /// Fetches one stored event by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Backend`] if the lookup fails.
    pub fn get(&self, event_id: &str) -> Result<Option<Value>> {
        Ok(self.store.get_event(event_id)?)
    }

    /// Returns stored events matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Backend`] if the query fails.
    pub fn query(&self, query: &EventQuery) -> Result<Vec<Value>> {
        Ok(self.store.query(query)?)
    }

    /// Counts stored events matching `query`, ignoring its pagination.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Backend`] if the query fails.
    pub fn count(&self, query: &EventQuery) -> Result<u64> {
        Ok(self.store.count(query)?)
    }
}
