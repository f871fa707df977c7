//! Scoped instrumentation and call wrapping.
//!
//! [`AuditScope`] times a block of work and logs exactly one event when it is
//! finished or dropped. [`Instrument`] and [`instrument`] do the same for a
//! single fallible call. Neither lets an audit failure reach the audited
//! code: failures are logged and the work's own result is returned untouched.

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;
use std::thread;
use std::time::Instant;

use mnemosyne_core::{AuditEvent, ResultStatus};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::engine::AuditEngine;
use crate::error::Result;
use crate::request::LogRequest;

#[derive(Debug, Clone)]
struct CapturedError {
    error_type: String,
    message: String,
    stack_trace: Option<String>,
}

/// Times a unit of work and logs it once.
///
/// The scope logs when [`AuditScope::finish`] is called or, failing that,
/// when it is dropped. A scope dropped during a panic is logged as a
/// `FAILURE`.
///
/// # Example
///
/// ```rust,no_run
/// use mnemosyne_audit::{AuditConfig, AuditEngine, AuditScope, LogRequest};
/// use serde_json::json;
///
/// let engine = AuditEngine::new(AuditConfig::default())?;
/// let mut scope = AuditScope::begin(
///     &engine,
///     LogRequest::new("nightly_export").with_category("FILE").with_action_type("CREATE"),
/// );
/// scope.add_metadata("rows", json!(1200));
/// scope.success("exported");
/// scope.finish()?;
/// # Ok::<(), mnemosyne_audit::AuditError>(())
/// ```
pub struct AuditScope<'a> {
    engine: &'a AuditEngine,
    request: Option<LogRequest>,
    started: Instant,
    status: ResultStatus,
    message: Option<String>,
    error: Option<CapturedError>,
}

impl<'a> AuditScope<'a> {
    /// Starts timing.
    #[must_use]
    pub fn begin(engine: &'a AuditEngine, request: LogRequest) -> Self {
        Self {
            engine,
            request: Some(request),
            started: Instant::now(),
            status: ResultStatus::Success,
            message: None,
            error: None,
        }
    }

    /// Marks the work as successful.
    pub fn success(&mut self, message: impl Into<String>) {
        self.status = ResultStatus::Success;
        self.message = Some(message.into());
    }

    /// Marks the work as failed.
    pub fn failure(&mut self, message: impl Into<String>) {
        self.status = ResultStatus::Failure;
        self.message = Some(message.into());
    }

    /// Marks the work as failed and records `err` (with its source chain)
    /// in the event's error section.
    pub fn record_error<E: StdError>(&mut self, err: &E) {
        let captured = capture_error(err);
        self.status = ResultStatus::Failure;
        self.message = Some(captured.message.clone());
        self.error = Some(captured);
    }

    /// Adds a field to the event's `custom` section.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: Value) {
        if let Some(request) = self.request.as_mut() {
            request.custom.insert(key.into(), value);
        }
    }

    /// Logs the event now and returns what the engine returned.
    ///
    /// # Errors
    ///
    /// Returns the engine's error. Dropping the scope instead logs the error
    /// and discards it.
    pub fn finish(mut self) -> Result<Option<AuditEvent>> {
        self.emit()
    }

    fn emit(&mut self) -> Result<Option<AuditEvent>> {
        let Some(request) = self.request.take() else {
            return Ok(None);
        };

        let mut result = json!({ "status": self.status.as_str() });
        if let Some(message) = &self.message {
            result["message"] = Value::String(message.clone());
        }

        let mut request = request
            .with_result(result)
            .with_performance(json!({ "duration_ms": elapsed_ms(self.started) }));
        if let Some(captured) = &self.error {
            request = request.with_error(error_info(captured));
        }

        self.engine.log(request)
    }
}

impl fmt::Debug for AuditScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditScope")
            .field("action", &self.request.as_ref().map(LogRequest::action))
            .field("status", &self.status)
            .field("finished", &self.request.is_none())
            .finish_non_exhaustive()
    }
}

impl Drop for AuditScope<'_> {
    fn drop(&mut self) {
        if self.request.is_none() {
            return;
        }
        if thread::panicking() {
            self.status = ResultStatus::Failure;
            if self.error.is_none() {
                self.error = Some(CapturedError {
                    error_type: "panic".to_string(),
                    message: "thread panicked inside audit scope".to_string(),
                    stack_trace: None,
                });
            }
        }
        if let Err(e) = self.emit() {
            error!(error = %e, "Failed to log audit event");
        }
    }
}

/// Longest captured string, in characters, before truncation.
const MAX_CAPTURED_STRING: usize = 1000;
/// Deepest captured nesting level.
const MAX_CAPTURED_DEPTH: usize = 5;
/// Largest captured list.
const MAX_CAPTURED_ITEMS: usize = 10;
/// Largest captured map.
const MAX_CAPTURED_KEYS: usize = 20;

/// Wraps a single fallible call in one audit event.
///
/// The event carries the wall-clock duration, a `SUCCESS` or `FAILURE`
/// status, `custom.function` (the action name) and, when set,
/// `custom.module`. On `Err` the error section records the error type, its
/// message, the source chain and `handled = false`. If the engine is
/// disabled the call runs without any audit work.
///
/// [`audit_call!`](crate::audit_call) builds one that records the calling
/// module.
///
/// # Example
///
/// ```rust,no_run
/// use mnemosyne_audit::{AuditConfig, AuditEngine, Instrument, LogRequest};
///
/// let engine = AuditEngine::new(AuditConfig::default())?;
/// let total = Instrument::new(&engine, LogRequest::new("parse_total"))
///     .with_module("billing")
///     .run_captured(|| "42".parse::<u32>());
/// assert_eq!(total, Ok(42));
/// # Ok::<(), mnemosyne_audit::AuditError>(())
/// ```
#[derive(Debug)]
#[must_use]
pub struct Instrument<'a> {
    engine: &'a AuditEngine,
    request: LogRequest,
    module: Option<String>,
}

impl<'a> Instrument<'a> {
    /// Creates a wrapper that logs `request` through `engine`.
    pub fn new(engine: &'a AuditEngine, request: LogRequest) -> Self {
        Self {
            engine,
            request,
            module: None,
        }
    }

    /// Records `module` as `custom.module`.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Runs `f`, logs the call and returns `f`'s result untouched.
    pub fn run<T, E, F>(self, f: F) -> std::result::Result<T, E>
    where
        E: StdError,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.execute(f, |_| None)
    }

    /// Like [`Instrument::run`], and also records the `Ok` value as
    /// `result.data`.
    ///
    /// Strings are cut at 1000 characters, nesting stops at depth 5, and
    /// lists over 10 items or maps over 20 keys are replaced by a summary.
    pub fn run_captured<T, E, F>(self, f: F) -> std::result::Result<T, E>
    where
        T: Serialize,
        E: StdError,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.execute(f, captured_data)
    }

    fn execute<T, E, F, C>(self, f: F, capture: C) -> std::result::Result<T, E>
    where
        E: StdError,
        F: FnOnce() -> std::result::Result<T, E>,
        C: FnOnce(&T) -> Option<Value>,
    {
        if !self.engine.is_enabled() {
            return f();
        }

        let started = Instant::now();
        let outcome = f();
        let duration_ms = elapsed_ms(started);

        let function = self.request.action().to_string();
        let mut request = self
            .request
            .with_performance(json!({ "duration_ms": duration_ms }))
            .with_custom_field("function", Value::String(function));
        if let Some(module) = self.module {
            request = request.with_custom_field("module", Value::String(module));
        }

        request = match &outcome {
            Ok(value) => {
                let mut result = json!({ "status": ResultStatus::Success.as_str() });
                if let Some(data) = capture(value) {
                    result["data"] = data;
                }
                request.with_result(result)
            }
            Err(e) => request
                .with_result(json!({ "status": ResultStatus::Failure.as_str() }))
                .with_error(error_info(&capture_error(e))),
        };

        if let Err(e) = self.engine.log(request) {
            error!(error = %e, "Failed to log audit event");
        }
        outcome
    }
}

/// Runs `f`, logs one event describing the call, and returns `f`'s result.
///
/// Shorthand for [`Instrument::new`] followed by [`Instrument::run`].
///
/// # Example
///
/// ```rust,no_run
/// use mnemosyne_audit::{instrument, AuditConfig, AuditEngine, LogRequest};
///
/// let engine = AuditEngine::new(AuditConfig::default())?;
/// let total: Result<u32, std::num::ParseIntError> = instrument(
///     &engine,
///     LogRequest::new("parse_total").with_category("API"),
///     || "42".parse::<u32>(),
/// );
/// assert_eq!(total, Ok(42));
/// # Ok::<(), mnemosyne_audit::AuditError>(())
/// ```
pub fn instrument<T, E, F>(
    engine: &AuditEngine,
    request: LogRequest,
    f: F,
) -> std::result::Result<T, E>
where
    E: StdError,
    F: FnOnce() -> std::result::Result<T, E>,
{
    Instrument::new(engine, request).run(f)
}

/// Starts an [`Instrument`](crate::Instrument) that records the calling
/// module as `custom.module`.
///
/// ```rust,no_run
/// use mnemosyne_audit::{audit_call, AuditConfig, AuditEngine, LogRequest};
///
/// let engine = AuditEngine::new(AuditConfig::default())?;
/// let port = audit_call!(&engine, LogRequest::new("read_port")).run(|| "8080".parse::<u16>());
/// assert_eq!(port, Ok(8080));
/// # Ok::<(), mnemosyne_audit::AuditError>(())
/// ```
#[macro_export]
macro_rules! audit_call {
    ($engine:expr, $request:expr $(,)?) => {
        $crate::Instrument::new($engine, $request).with_module(::std::module_path!())
    };
}

fn capture_error<E: StdError>(err: &E) -> CapturedError {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(format!("caused by: {cause}"));
        source = cause.source();
    }

    CapturedError {
        error_type: type_name::<E>().to_string(),
        message: err.to_string(),
        stack_trace: (!chain.is_empty()).then(|| chain.join("\n")),
    }
}

fn captured_data<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(Value::Null) => None,
        Ok(data) => Some(bounded(&data, 0)),
        Err(e) => {
            warn!(error = %e, "Failed to capture call result");
            None
        }
    }
}

fn bounded(value: &Value, depth: usize) -> Value {
    if depth > MAX_CAPTURED_DEPTH {
        return Value::String(format!("<max depth {MAX_CAPTURED_DEPTH} exceeded>"));
    }
    match value {
        Value::String(text) if text.chars().count() > MAX_CAPTURED_STRING => {
            let head: String = text.chars().take(MAX_CAPTURED_STRING).collect();
            Value::String(format!("{head}... (truncated)"))
        }
        Value::Array(items) if items.len() > MAX_CAPTURED_ITEMS => {
            Value::String(format!("<list with {} items>", items.len()))
        }
        Value::Array(items) => items.iter().map(|item| bounded(item, depth + 1)).collect(),
        Value::Object(map) if map.len() > MAX_CAPTURED_KEYS => {
            Value::String(format!("<map with {} keys>", map.len()))
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), bounded(item, depth + 1)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn error_info(captured: &CapturedError) -> Value {
    let mut info = json!({
        "occurred": true,
        "type": captured.error_type,
        "message": captured.message,
        "handled": false,
    });
    if let Some(trace) = &captured.stack_trace {
        info["stack_trace"] = Value::String(trace.clone());
    }
    info
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuditConfig, BackendConfig, FileSettings};
    use std::fs;
    use std::panic::{self, AssertUnwindSafe};
    use tempfile::TempDir;

    fn engine_in(dir: &TempDir) -> AuditEngine {
        let config = AuditConfig::default().with_backends(vec![BackendConfig::File(
            FileSettings::new(dir.path().to_string_lossy()).with_format("jsonl"),
        )]);
        AuditEngine::new(config).unwrap()
    }

    fn stored_events(dir: &TempDir) -> Vec<Value> {
        let mut events = Vec::new();
        for entry in fs::read_dir(dir.path()).unwrap() {
            let content = fs::read_to_string(entry.unwrap().path()).unwrap();
            events.extend(content.lines().map(|l| serde_json::from_str::<Value>(l).unwrap()));
        }
        events
    }

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk full")
        }
    }

    impl StdError for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("export failed")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_finish_logs_success_with_metadata() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let mut scope = AuditScope::begin(
            &engine,
            LogRequest::new("nightly_export")
                .with_category("FILE")
                .with_action_type("CREATE"),
        );
        scope.add_metadata("rows", json!(10));
        scope.success("done");
        let event = scope.finish().unwrap().unwrap();

        assert_eq!(event.action.action_type, mnemosyne_core::ActionType::Create);

        assert_eq!(event.action.result.status, ResultStatus::Success);
        assert_eq!(event.action.result.message.as_deref(), Some("done"));
        assert_eq!(event.custom["rows"], 10);
        assert!(event.performance.duration_ms.unwrap() >= 0.0);
        assert!(!event.error.occurred);
    }

    #[test]
    fn test_drop_logs_exactly_once() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        {
            let mut scope = AuditScope::begin(&engine, LogRequest::new("cleanup"));
            scope.failure("partially done");
        }
        engine.shutdown();

        let events = stored_events(&dir);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["action"]["result"]["status"], "FAILURE");
        assert_eq!(engine.stats().events_logged, 1);
    }

    #[test]
    fn test_record_error_captures_chain() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let mut scope = AuditScope::begin(&engine, LogRequest::new("export"));
        scope.record_error(&Outer(Inner));
        let event = scope.finish().unwrap().unwrap();

        assert!(event.error.occurred);
        assert!(!event.error.handled);
        assert_eq!(event.error.message.as_deref(), Some("export failed"));
        assert_eq!(event.error.stack_trace.as_deref(), Some("caused by: disk full"));
        assert!(event.error.error_type.unwrap().ends_with("Outer"));
    }

    #[test]
    fn test_panic_inside_scope_is_failure() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _scope = AuditScope::begin(&engine, LogRequest::new("risky"));
            panic!("boom");
        }));
        assert!(outcome.is_err());
        engine.shutdown();

        let events = stored_events(&dir);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["action"]["result"]["status"], "FAILURE");
        assert_eq!(events[0]["error"]["type"], "panic");
    }

    #[test]
    fn test_audit_failure_does_not_escape_drop() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        // An invalid category makes the engine reject the event.
        drop(AuditScope::begin(&engine, LogRequest::new("x").with_category("NOPE")));
        assert_eq!(engine.stats().events_logged, 0);
    }

    #[test]
    fn test_instrument_returns_result_unchanged() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let ok = instrument(&engine, LogRequest::new("add"), || "4".parse::<u32>());
        assert_eq!(ok, Ok(4));

        let err = instrument(&engine, LogRequest::new("fail"), || "x".parse::<u32>());
        assert_eq!(err, "x".parse::<u32>());
        engine.shutdown();

        let events = stored_events(&dir);
        assert_eq!(events.len(), 2);
        let failed = events
            .iter()
            .find(|e| e["action"]["operation"] == "fail")
            .unwrap();
        assert_eq!(failed["action"]["result"]["status"], "FAILURE");
        assert_eq!(failed["error"]["occurred"], true);
        assert_eq!(failed["error"]["handled"], false);
        assert_eq!(failed["error"]["message"], "invalid digit found in string");
        assert_eq!(failed["custom"]["function"], "fail");
        assert!(failed["custom"].get("module").is_none());
        assert!(failed["action"]["result"].get("data").is_none());
    }

    #[test]
    fn test_instrument_records_error_chain() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let out: std::result::Result<(), Outer> =
            instrument(&engine, LogRequest::new("export"), || Err(Outer(Inner)));
        assert!(out.is_err());
        engine.shutdown();

        let events = stored_events(&dir);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["error"]["message"], "export failed");
        assert_eq!(events[0]["error"]["stack_trace"], "caused by: disk full");
        assert!(events[0]["error"]["type"].as_str().unwrap().ends_with("Outer"));
    }

    #[test]
    fn test_run_captured_records_bounded_result() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let long = "a".repeat(1500);
        let out = Instrument::new(&engine, LogRequest::new("report")).run_captured(|| {
            Ok::<_, std::num::ParseIntError>(json!({
                "summary": long,
                "rows": (0..12).collect::<Vec<_>>(),
                "top": [1, 2, 3],
            }))
        });
        assert!(out.is_ok());
        engine.shutdown();

        let events = stored_events(&dir);
        let data = &events[0]["action"]["result"]["data"];
        assert_eq!(events[0]["action"]["result"]["status"], "SUCCESS");
        assert_eq!(data["summary"], format!("{}... (truncated)", "a".repeat(1000)));
        assert_eq!(data["rows"], "<list with 12 items>");
        assert_eq!(data["top"], json!([1, 2, 3]));
    }

    #[test]
    fn test_run_captured_skips_unit_result() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let out = Instrument::new(&engine, LogRequest::new("noop"))
            .run_captured(|| Ok::<_, std::num::ParseIntError>(()));
        assert!(out.is_ok());
        engine.shutdown();

        let events = stored_events(&dir);
        assert!(events[0]["action"]["result"].get("data").is_none());
    }

    #[test]
    fn test_bounded_limits_depth_and_keys() {
        let mut nested = json!(1);
        for _ in 0..7 {
            nested = json!([nested]);
        }
        let clipped = bounded(&nested, 0);
        assert_eq!(clipped[0][0][0][0][0][0], "<max depth 5 exceeded>");

        let wide: serde_json::Map<String, Value> =
            (0..21).map(|i| (format!("k{i}"), json!(i))).collect();
        assert_eq!(bounded(&Value::Object(wide), 0), "<map with 21 keys>");

        let short = json!({"name": "x", "n": 1, "ok": true, "none": null});
        assert_eq!(bounded(&short, 0), short);
    }

    #[test]
    fn test_audit_call_records_module() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let port = crate::audit_call!(&engine, LogRequest::new("read_port"))
            .run(|| "8080".parse::<u16>());
        assert_eq!(port, Ok(8080));
        engine.shutdown();

        let events = stored_events(&dir);
        assert_eq!(events[0]["custom"]["module"], module_path!());
        assert_eq!(events[0]["custom"]["function"], "read_port");
    }

    #[test]
    fn test_instrument_swallows_audit_errors() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let out = instrument(&engine, LogRequest::new("   "), || {
            Ok::<_, std::num::ParseIntError>("ran")
        });
        assert_eq!(out, Ok("ran"));
    }

    #[test]
    fn test_instrument_skips_audit_when_disabled() {
        let dir = TempDir::new().unwrap();
        let config = AuditConfig::default()
            .with_enabled(false)
            .with_backends(vec![BackendConfig::File(FileSettings::new(
                dir.path().to_string_lossy(),
            ))]);
        let engine = AuditEngine::new(config).unwrap();

        let out = instrument(&engine, LogRequest::new("x"), || "1".parse::<i32>());
        assert_eq!(out, Ok(1));
        assert!(stored_events(&dir).is_empty());
    }
}
