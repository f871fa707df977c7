//! End-to-end behavior of the engine across multiple backends.

use std::sync::Arc;
use std::thread;

use mnemosyne_audit::{AuditConfig, AuditEngine, AuditError, FilterConfig, LogRequest};
use mnemosyne_core::AuditEvent;
use mnemosyne_sanitizer::{SanitizeError, Sanitizer};
use mnemosyne_storage::{StorageBackend, StorageError};
use parking_lot::Mutex;
use serde_json::json;

/// Keeps every stored event in memory.
#[derive(Debug, Default)]
struct MemoryBackend {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryBackend {
    fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl StorageBackend for MemoryBackend {
    fn store(&self, event: &AuditEvent) -> mnemosyne_storage::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn close(&self) {}
}

/// Rejects every write.
#[derive(Debug)]
struct FailingBackend(&'static str);

impl StorageBackend for FailingBackend {
    fn store(&self, _event: &AuditEvent) -> mnemosyne_storage::Result<()> {
        Err(StorageError::UnsupportedFormat {
            format: self.0.to_string(),
        })
    }

    fn close(&self) {}
}

#[derive(Debug)]
struct BrokenSanitizer;

impl Sanitizer for BrokenSanitizer {
    fn sanitize_event(&self, _event: &mut AuditEvent) -> mnemosyne_sanitizer::Result<()> {
        Err(SanitizeError::Failed {
            reason: "rule engine crashed".to_string(),
        })
    }
}

fn base_config() -> AuditConfig {
    AuditConfig::default().with_backends(Vec::new())
}

#[test]
fn test_one_failing_backend_does_not_fail_the_call() {
    let memory = Arc::new(MemoryBackend::default());
    let engine = AuditEngine::builder()
        .with_config(base_config())
        .with_backend("broken", Arc::new(FailingBackend("broken")))
        .with_backend("memory", memory.clone())
        .build()
        .unwrap();

    let event = engine.log(LogRequest::new("login")).unwrap();
    assert!(event.is_some());
    assert_eq!(memory.len(), 1);

    let stats = engine.stats();
    assert_eq!(stats.events_logged, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.backends, 2);
}

#[test]
fn test_all_backends_failing_names_each() {
    let engine = AuditEngine::builder()
        .with_config(base_config())
        .with_backend("primary", Arc::new(FailingBackend("a")))
        .with_backend("secondary", Arc::new(FailingBackend("b")))
        .build()
        .unwrap();

    let err = engine.log(LogRequest::new("login")).unwrap_err();
    assert!(matches!(err, AuditError::Storage { .. }));

    let msg = err.to_string();
    assert!(msg.starts_with("Storage error: All storage backends failed: "));
    assert!(msg.contains("primary: "));
    assert!(msg.contains("; secondary: "));

    let stats = engine.stats();
    assert_eq!(stats.events_logged, 0);
    assert_eq!(stats.errors, 1);
}

#[test]
fn test_filtered_event_is_not_stored() {
    let memory = Arc::new(MemoryBackend::default());
    let config = base_config().with_filter(FilterConfig::ExcludeCategory {
        categories: vec!["SYSTEM".into()],
    });
    let engine = AuditEngine::builder()
        .with_config(config)
        .with_backend("memory", memory.clone())
        .build()
        .unwrap();

    assert!(engine.log(LogRequest::new("heartbeat")).unwrap().is_none());
    assert!(engine
        .log(LogRequest::new("query").with_category("DATABASE"))
        .unwrap()
        .is_some());

    assert_eq!(memory.len(), 1);
    assert_eq!(engine.stats().events_logged, 1);
    assert_eq!(engine.stats().errors, 0);
}

#[test]
fn test_disabled_engine_writes_nothing() {
    let memory = Arc::new(MemoryBackend::default());
    let engine = AuditEngine::builder()
        .with_config(base_config().with_enabled(false))
        .with_backend("memory", memory.clone())
        .build()
        .unwrap();

    assert!(engine.log(LogRequest::new("anything")).unwrap().is_none());
    assert_eq!(memory.len(), 0);
}

#[test]
fn test_fail_closed_drops_event() {
    let memory = Arc::new(MemoryBackend::default());
    let engine = AuditEngine::builder()
        .with_config(base_config())
        .with_backend("memory", memory.clone())
        .with_sanitizer(Arc::new(BrokenSanitizer))
        .build()
        .unwrap();

    let err = engine.log(LogRequest::new("login")).unwrap_err();
    assert!(matches!(err, AuditError::Processing { .. }));
    assert!(err.to_string().contains("was not stored to prevent PII leakage"));
    assert_eq!(memory.len(), 0);
    assert_eq!(engine.stats().errors, 1);
}

#[test]
fn test_fail_open_stores_unsanitized_event() {
    let memory = Arc::new(MemoryBackend::default());
    let engine = AuditEngine::builder()
        .with_config(base_config().with_fail_on_sanitization_error(false))
        .with_backend("memory", memory.clone())
        .with_sanitizer(Arc::new(BrokenSanitizer))
        .build()
        .unwrap();

    let event = engine
        .log(LogRequest::new("login").with_parameter("password", json!("hunter2")))
        .unwrap()
        .unwrap();
    assert_eq!(event.action.parameters["password"], "hunter2");
    assert_eq!(memory.len(), 1);
    assert_eq!(engine.stats().errors, 0);
}

#[test]
fn test_concurrent_logging_counts_every_event() {
    let memory = Arc::new(MemoryBackend::default());
    let engine = Arc::new(
        AuditEngine::builder()
            .with_config(base_config())
            .with_backend("memory", memory.clone())
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..25 {
                    engine
                        .log(LogRequest::new(format!("op_{t}_{i}")))
                        .unwrap()
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memory.len(), 200);
    assert_eq!(engine.stats().events_logged, 200);
}
