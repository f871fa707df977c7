//! Process-wide default engine.
//!
//! Prefer passing an [`AuditEngine`] explicitly. This accessor exists for
//! code that cannot thread one through, such as a panic hook.

use once_cell::sync::OnceCell;
use tracing::info;

use crate::config::AuditConfig;
use crate::engine::AuditEngine;
use crate::error::{ConfigError, Result};

static DEFAULT_ENGINE: OnceCell<AuditEngine> = OnceCell::new();

/// Returns the default engine, building it from [`AuditConfig::default`] on
/// first use.
///
/// Concurrent first calls build exactly one engine.
///
/// # Errors
///
/// Returns the construction error if the engine cannot be built. A later
/// call retries.
pub fn default_engine() -> Result<&'static AuditEngine> {
    DEFAULT_ENGINE.get_or_try_init(|| {
        info!("Building default audit engine");
        AuditEngine::new(AuditConfig::default())
    })
}

/// Builds the default engine from `config`.
///
/// # Errors
///
/// Returns a configuration error if the default engine already exists, or
/// the construction error.
pub fn init_default_engine(config: AuditConfig) -> Result<&'static AuditEngine> {
    let mut built = false;
    let engine = DEFAULT_ENGINE.get_or_try_init(|| {
        built = true;
        AuditEngine::new(config)
    })?;

    if built {
        Ok(engine)
    } else {
        Err(ConfigError::Invalid {
            reason: "default audit engine is already initialized".to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, FileSettings};
    use tempfile::TempDir;

    #[test]
    fn test_init_once_then_shared() {
        let dir = TempDir::new().unwrap();
        let config = AuditConfig::default()
            .with_application_name("global-test")
            .with_backends(vec![BackendConfig::File(FileSettings::new(
                dir.path().to_string_lossy(),
            ))]);

        let engine = init_default_engine(config.clone()).unwrap();
        assert_eq!(engine.config().application_name, "global-test");

        let again = default_engine().unwrap();
        assert!(std::ptr::eq(engine, again));

        let err = init_default_engine(config).unwrap_err();
        assert!(err.to_string().contains("already initialized"));
    }
}
