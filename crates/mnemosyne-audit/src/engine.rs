//! The audit engine.

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mnemosyne_core::{ActionCategory, ActionType, AuditEvent, Fields};
use mnemosyne_sanitizer::{PiiSanitizer, Sanitizer};
use mnemosyne_storage::file::DEFAULT_DIRECTORY;
use mnemosyne_storage::{
    FileBackend, FileBackendConfig, FileFormat, SqlBackend, StorageBackend, StorageError,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::{AuditConfig, BackendConfig};
use crate::error::{AuditError, Result};
use crate::filter::FilterChain;
use crate::request::LogRequest;

/// Counters reported by [`AuditEngine::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Events stored by at least one backend
    pub events_logged: u64,
    /// Build, processing and storage failures
    pub errors: u64,
    /// Number of active backends
    pub backends: usize,
    /// Whether logging is enabled
    pub enabled: bool,
}

#[derive(Debug, Clone)]
struct RegisteredBackend {
    label: String,
    backend: Arc<dyn StorageBackend>,
}

/// Validates, builds, sanitizes, filters and stores audit events.
///
/// The engine holds no lock across calls. Each backend serializes its own
/// writes, and the counters are atomic, so `log` may be called from many
/// threads at once.
///
/// # Example
///
/// ```rust,no_run
/// use mnemosyne_audit::{AuditConfig, AuditEngine, LogRequest};
///
/// let engine = AuditEngine::new(AuditConfig::default())?;
/// let event = engine.log(
///     LogRequest::new("user_login")
///         .with_category("AUTH")
///         .with_action_type("LOGIN"),
/// )?;
/// assert!(event.is_some());
/// engine.shutdown();
/// # Ok::<(), mnemosyne_audit::AuditError>(())
/// ```
#[derive(Debug)]
pub struct AuditEngine {
    config: AuditConfig,
    backends: Vec<RegisteredBackend>,
    sanitizer: Option<Arc<dyn Sanitizer>>,
    filters: FilterChain,
    system: Fields,
    events_logged: AtomicU64,
    errors: AtomicU64,
}

impl AuditEngine {
    /// Creates an engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid filter, or a storage
    /// error if not even the default file backend can be created.
    pub fn new(config: AuditConfig) -> Result<Self> {
        Self::builder().with_config(config).build()
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> AuditEngineBuilder {
        AuditEngineBuilder::new()
    }

    /// Returns the configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Returns whether logging is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns the labels of the active backends, in write order.
    #[must_use]
    pub fn backend_labels(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.label.as_str()).collect()
    }

    /// Returns the cached host and runtime facts stamped into every event.
    #[must_use]
    pub const fn system_info(&self) -> &Fields {
        &self.system
    }

    /// Logs one action.
    ///
    /// Returns the stored event, or `None` when logging is disabled, the
    /// event was filtered out, or it could not be built.
    ///
    /// # Errors
    ///
    /// - [`AuditError::Validation`] for an empty action or an unknown
    ///   category or action type
    /// - [`AuditError::Processing`] if sanitization fails and the engine is
    ///   fail-closed
    /// - [`AuditError::Storage`] if every backend fails
    pub fn log(&self, request: LogRequest) -> Result<Option<AuditEvent>> {
        if !self.config.enabled {
            debug!("Audit logging disabled, skipping event");
            return Ok(None);
        }

        let action = request.action.trim().to_string();
        if action.is_empty() {
            return Err(mnemosyne_core::ValidationError::empty(
                "action",
                "action cannot be empty or whitespace-only",
            )
            .into());
        }

        let category: ActionCategory = request.category.parse().map_err(|e| {
            error!(error = %e, "Input validation failed");
            e
        })?;
        let action_type: ActionType = request.action_type.parse().map_err(|e| {
            error!(error = %e, "Input validation failed");
            e
        })?;

        let event = match self.build_event(action, category, action_type, request) {
            Ok(event) => event,
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Failed to build audit event");
                return Ok(None);
            }
        };

        self.process_and_store(event)
    }

    /// Logs a complete event given as a JSON object map.
    ///
    /// # Errors
    ///
    /// Same as [`AuditEngine::log`]; a malformed map is a validation error.
    pub fn log_event(&self, map: Fields) -> Result<Option<AuditEvent>> {
        if !self.config.enabled {
            debug!("Audit logging disabled, skipping event");
            return Ok(None);
        }

        let event = AuditEvent::from_map(map)?;
        self.process_and_store(event)
    }

    /// Returns a snapshot of the engine counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            events_logged: self.events_logged.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            backends: self.backends.len(),
            enabled: self.config.enabled,
        }
    }

    /// Closes every backend.
    ///
    /// File backends reopen lazily if the engine is used afterwards.
    pub fn shutdown(&self) {
        info!("Shutting down audit engine");
        for entry in &self.backends {
            entry.backend.close();
            debug!(backend = %entry.label, "Closed storage backend");
        }
        info!("Audit engine shutdown complete");
    }

    fn build_event(
        &self,
        operation: String,
        category: ActionCategory,
        action_type: ActionType,
        request: LogRequest,
    ) -> std::result::Result<AuditEvent, serde_json::Error> {
        let mut event = AuditEvent::new();

        event.action.category = category;
        event.action.action_type = action_type;
        event.action.operation = Some(operation);
        event.action.description = request.description;
        event.action.parameters = request.parameters;

        if let Some(resource) = request.resource {
            event.action.resource = serde_json::from_value(resource)?;
        }
        if let Some(result) = request.result {
            event.action.result = serde_json::from_value(result)?;
        }
        if let Some(actor) = request.actor {
            event.actor = serde_json::from_value(actor)?;
        }
        if let Some(session) = request.session {
            event.session = serde_json::from_value(session)?;
        }
        if let Some(performance) = request.performance {
            event.performance = serde_json::from_value(performance)?;
        }
        if let Some(error) = request.error {
            event.error = serde_json::from_value(error)?;
        }

        event.system = self.system.clone();
        event.custom = request.custom;
        event.metadata = request.metadata;
        event.metadata.insert(
            "application".to_string(),
            Value::String(self.config.application_name.clone()),
        );
        event.metadata.insert(
            "environment".to_string(),
            Value::String(self.config.environment.clone()),
        );

        Ok(event)
    }

    fn process_and_store(&self, mut event: AuditEvent) -> Result<Option<AuditEvent>> {
        if let Err(e) = self.sanitize(&mut event) {
            self.errors.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        if let Some(rule) = self.filters.matching_rule(&event) {
            debug!(event_id = event.event_id(), ?rule, "Event filtered out");
            return Ok(None);
        }

        if let Err(e) = self.store(&event) {
            self.errors.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        self.events_logged.fetch_add(1, Ordering::Relaxed);
        Ok(Some(event))
    }

    fn sanitize(&self, event: &mut AuditEvent) -> Result<()> {
        let Some(sanitizer) = &self.sanitizer else {
            return Ok(());
        };

        match sanitizer.sanitize_event(event) {
            Ok(()) => Ok(()),
            Err(e) if self.config.fail_on_sanitization_error => {
                error!(event_id = event.event_id(), error = %e, "Failed to sanitize event");
                Err(AuditError::Processing {
                    event_id: event.event_id().to_string(),
                    source: e,
                })
            }
            Err(e) => {
                warn!(
                    event_id = event.event_id(),
                    error = %e,
                    "Logging unsanitized event (fail_on_sanitization_error = false); PII may be present"
                );
                Ok(())
            }
        }
    }

    fn store(&self, event: &AuditEvent) -> Result<()> {
        let mut failures = Vec::new();

        for entry in &self.backends {
            if let Err(e) = entry.backend.store(event) {
                error!(
                    backend = %entry.label,
                    event_id = event.event_id(),
                    error = %e,
                    "Failed to store event"
                );
                failures.push(format!("{}: {e}", entry.label));
            }
        }

        if !failures.is_empty() && failures.len() == self.backends.len() {
            return Err(AuditError::Storage {
                message: failures.join("; "),
            });
        }
        Ok(())
    }
}

/// Builder for [`AuditEngine`].
#[derive(Debug, Default)]
pub struct AuditEngineBuilder {
    config: AuditConfig,
    backends: Vec<RegisteredBackend>,
    sanitizer: Option<Arc<dyn Sanitizer>>,
}

impl AuditEngineBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: AuditConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a backend after those created from configuration.
    #[must_use]
    pub fn with_backend(
        mut self,
        label: impl Into<String>,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        self.backends.push(RegisteredBackend {
            label: label.into(),
            backend,
        });
        self
    }

    /// Replaces the default PII sanitizer. Ignored when sanitization is
    /// disabled in the configuration.
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    /// Builds the engine.
    ///
    /// Configured backends that fail to initialise are logged and skipped.
    /// If no backend remains, a JSON file backend in `./logs/audit` is used.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid filter, or a storage
    /// error if the fallback backend cannot be created.
    pub fn build(self) -> Result<AuditEngine> {
        let config = self.config;
        let filters = FilterChain::from_config(&config.filters)?;

        let mut backends: Vec<RegisteredBackend> = config
            .storage
            .backends
            .iter()
            .filter(|backend| backend.is_enabled())
            .filter_map(|backend| {
                let label = backend.label();
                match open_backend(backend) {
                    Ok(backend) => {
                        info!(backend = %label, "Initialized storage backend");
                        Some(RegisteredBackend { label, backend })
                    }
                    Err(e) => {
                        error!(backend = %label, error = %e, "Failed to initialize storage backend");
                        None
                    }
                }
            })
            .collect();
        backends.extend(self.backends);

        if backends.is_empty() {
            warn!("No storage backends initialized, using default file storage");
            let fallback = FileBackend::new(
                FileBackendConfig::new(DEFAULT_DIRECTORY).with_format(FileFormat::Json),
            )
            .map_err(|e| AuditError::Storage {
                message: format!("file:{DEFAULT_DIRECTORY}: {e}"),
            })?;
            backends.push(RegisteredBackend {
                label: format!("file:{DEFAULT_DIRECTORY}"),
                backend: Arc::new(fallback),
            });
        }

        let sanitizer: Option<Arc<dyn Sanitizer>> = if config.sanitization.enabled {
            Some(
                self.sanitizer
                    .unwrap_or_else(|| default_sanitizer(config.sanitization.max_depth)),
            )
        } else {
            None
        };
        if sanitizer.is_some() {
            info!("PII sanitizer initialized");
        }

        info!(
            application = %config.application_name,
            enabled = config.enabled,
            backends = backends.len(),
            "Audit engine initialized"
        );

        Ok(AuditEngine {
            config,
            backends,
            sanitizer,
            filters,
            system: system_info(),
            events_logged: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        })
    }
}

fn default_sanitizer(max_depth: usize) -> Arc<dyn Sanitizer> {
    Arc::new(PiiSanitizer::new().with_max_depth(max_depth))
}

fn open_backend(
    config: &BackendConfig,
) -> std::result::Result<Arc<dyn StorageBackend>, StorageError> {
    match config {
        BackendConfig::File(file) => {
            let backend = FileBackend::new(
                FileBackendConfig::new(&file.directory)
                    .with_format(FileFormat::from_name(&file.format))
                    .with_filename_pattern(&file.filename_pattern),
            )?;
            Ok(Arc::new(backend))
        }
        BackendConfig::Sql(sql) => {
            let backend = SqlBackend::new(&sql.url)?.with_echo(sql.echo);
            Ok(Arc::new(backend))
        }
    }
}

fn system_info() -> Fields {
    use std::env::consts::{ARCH, FAMILY, OS};

    let mut system = Fields::new();
    system.insert(
        "host".to_string(),
        json!({
            "hostname": hostname(),
            "os": OS,
            "family": FAMILY,
            "architecture": ARCH,
        }),
    );
    system.insert(
        "runtime".to_string(),
        json!({
            "library_version": env!("CARGO_PKG_VERSION"),
            "platform": format!("{ARCH}-{OS}"),
        }),
    );
    system
}

fn hostname() -> String {
    let non_empty = |s: String| {
        let trimmed = s.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    std::env::var("HOSTNAME")
        .ok()
        .and_then(non_empty)
        .or_else(|| fs::read_to_string("/etc/hostname").ok().and_then(non_empty))
        .or_else(|| std::env::var("COMPUTERNAME").ok().and_then(non_empty))
        .unwrap_or_else(|| "unknown".to_string())
}
