//! The storage capability shared by every backend.

use std::fmt::Debug;

use mnemosyne_core::AuditEvent;

use crate::error::Result;

/// A persistence target for audit events.
///
/// Implementations serialize concurrent `store` calls internally; the engine
/// holds no lock across backends.
pub trait StorageBackend: Send + Sync + Debug {
    /// Persists one event.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`](crate::StorageError) if the event could not
    /// be persisted.
    fn store(&self, event: &AuditEvent) -> Result<()>;

    /// Releases any held resources.
    ///
    /// Idempotent and best-effort: failures are logged, never returned.
    fn close(&self);
}
