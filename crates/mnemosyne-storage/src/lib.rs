//! # Mnemosyne Storage
//!
//! Storage backends for audit events.
//!
//! Every backend implements [`StorageBackend`], which has exactly two
//! operations: `store` and `close`. Two implementations are provided:
//!
//! - [`FileBackend`] - appends to date/category-rotated files in one of
//!   several [`FileFormat`]s
//! - [`SqlBackend`] - writes rows of the shared [`schema`] to SQLite
//!
//! ## Example
//!
//! ```rust,no_run
//! use mnemosyne_core::AuditEvent;
//! use mnemosyne_storage::{FileBackend, FileBackendConfig, FileFormat, StorageBackend};
//!
//! let backend = FileBackend::new(
//!     FileBackendConfig::new("/var/log/audit").with_format(FileFormat::Jsonl),
//! )?;
//! backend.store(&AuditEvent::new())?;
//! backend.close();
//! # Ok::<(), mnemosyne_storage::StorageError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
pub mod file;
pub mod format;
pub mod schema;
pub mod sql;

pub use backend::StorageBackend;
pub use error::{Result, StorageError};
pub use file::{FileBackend, FileBackendConfig};
pub use format::FileFormat;
pub use schema::{Column, EventRow};
pub use sql::{DatabaseTarget, EventQuery, SqlBackend};
