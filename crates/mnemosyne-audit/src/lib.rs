//! # Mnemosyne Audit
//!
//! The audit engine: the entry point applications call to record events.
//!
//! Each call to [`AuditEngine::log`] goes through the same pipeline:
//!
//! 1. **Validate** the action, category and action type
//! 2. **Build** an [`AuditEvent`](mnemosyne_core::AuditEvent) stamped with
//!    host facts and application metadata
//! 3. **Sanitize** PII, fail-closed unless configured otherwise
//! 4. **Filter** against the configured exclusion rules
//! 5. **Store** to every backend; the call fails only if all of them fail
//!
//! On top of the engine this crate provides [`AuditScope`] and
//! [`instrument`] for timing work, [`EventIngestor`] for events produced
//! elsewhere, and an optional process-wide [`default_engine`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use mnemosyne_audit::{AuditConfig, AuditEngine, LogRequest};
//! use serde_json::json;
//!
//! let config = AuditConfig::from_file("audit.yaml")?;
//! let engine = AuditEngine::new(config)?;
//!
//! engine.log(
//!     LogRequest::new("delete_user")
//!         .with_category("ADMIN")
//!         .with_action_type("DELETE")
//!         .with_actor(json!({"type": "user", "username": "root"}))
//!         .with_parameter("user_id", json!(42)),
//! )?;
//!
//! println!("{:?}", engine.stats());
//! engine.shutdown();
//! # Ok::<(), mnemosyne_audit::AuditError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod engine;
mod error;
pub mod filter;
mod global;
mod ingest;
mod request;
mod scope;

pub use config::{
    AuditConfig, BackendConfig, FileSettings, FilterConfig, SanitizationConfig, SqlSettings,
    StorageConfig,
};
pub use engine::{AuditEngine, AuditEngineBuilder, EngineStats};
pub use error::{AuditError, ConfigError, Result};
pub use filter::{FilterChain, FilterRule};
pub use global::{default_engine, init_default_engine};
pub use ingest::{BatchFailure, BatchOutcome, EventIngestor, MAX_BATCH_SIZE};
pub use request::LogRequest;
pub use scope::{instrument, AuditScope, Instrument};
