//! Engine configuration.
//!
//! Configuration is read from YAML. Every field has a default, so an empty
//! document yields a working engine that writes JSON files to
//! `./logs/audit`.
//!
//! ```yaml
//! enabled: true
//! application_name: billing
//! environment: ${DEPLOY_ENV}
//! fail_on_sanitization_error: true
//! sanitization:
//!   enabled: true
//! filters:
//!   - type: exclude_category
//!     categories: [SYSTEM]
//! storage:
//!   backends:
//!     - type: file
//!       directory: ${AUDIT_LOG_DIR}/app
//!       format: jsonl
//!     - type: sql
//!       url: sqlite:///audit.db
//! ```
//!
//! `${NAME}` references anywhere in a string value are replaced from the
//! process environment before the document is interpreted.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;

use mnemosyne_sanitizer::DEFAULT_MAX_DEPTH;
use mnemosyne_storage::file::{DEFAULT_DIRECTORY, DEFAULT_FILENAME_PATTERN};
use mnemosyne_storage::sql::DEFAULT_URL;

use crate::error::ConfigError;

static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env reference pattern is valid")
});

const fn default_true() -> bool {
    true
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Master switch; when false `log` is a no-op
    pub enabled: bool,

    /// Stamped into every event's `metadata.application`
    pub application_name: String,

    /// Stamped into every event's `metadata.environment`
    pub environment: String,

    /// Refuse to store an event the sanitizer could not process
    pub fail_on_sanitization_error: bool,

    /// PII sanitization settings
    pub sanitization: SanitizationConfig,

    /// Ordered exclusion rules
    pub filters: Vec<FilterConfig>,

    /// Storage backends
    pub storage: StorageConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            application_name: "app".to_string(),
            environment: "production".to_string(),
            fail_on_sanitization_error: true,
            sanitization: SanitizationConfig::default(),
            filters: Vec::new(),
            storage: StorageConfig::default(),
        }
    }
}

impl AuditConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist, and the
    /// errors of [`AuditConfig::from_yaml_str`] for its content.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parses configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or unknown backend or
    /// filter types, [`ConfigError::MissingEnvVar`] for an unset `${NAME}`
    /// reference, and [`ConfigError::Invalid`] if validation fails.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let raw: YamlValue = serde_yaml::from_str(yaml)?;
        let config: Self = match substitute_env(raw)? {
            YamlValue::Null => Self::default(),
            value => serde_yaml::from_value(value)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "application_name cannot be empty".to_string(),
            });
        }
        for backend in &self.storage.backends {
            match backend {
                BackendConfig::File(file) if file.directory.trim().is_empty() => {
                    return Err(ConfigError::Invalid {
                        reason: "file backend directory cannot be empty".to_string(),
                    });
                }
                BackendConfig::Sql(sql) if sql.url.trim().is_empty() => {
                    return Err(ConfigError::Invalid {
                        reason: "sql backend url cannot be empty".to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Enables or disables logging.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the application name.
    #[must_use]
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Sets the environment name.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Chooses between fail-closed (`true`) and fail-open sanitization.
    #[must_use]
    pub const fn with_fail_on_sanitization_error(mut self, fail: bool) -> Self {
        self.fail_on_sanitization_error = fail;
        self
    }

    /// Enables or disables PII sanitization.
    #[must_use]
    pub const fn with_sanitization(mut self, enabled: bool) -> Self {
        self.sanitization.enabled = enabled;
        self
    }

    /// Appends a filter rule.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filters.push(filter);
        self
    }

    /// Replaces the configured backends.
    #[must_use]
    pub fn with_backends(mut self, backends: Vec<BackendConfig>) -> Self {
        self.storage.backends = backends;
        self
    }
}

/// PII sanitization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizationConfig {
    /// Whether events are sanitized before storage
    pub enabled: bool,

    /// Maximum nesting depth the sanitizer walks
    pub max_depth: usize,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// An exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Drop events whose category is listed
    ExcludeCategory {
        /// Categories to drop (any case)
        #[serde(default)]
        categories: Vec<String>,
    },
    /// Drop events whose action type is listed
    ExcludeActionType {
        /// Action types to drop (any case)
        #[serde(default)]
        action_types: Vec<String>,
    },
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backends in the order they are written to
    pub backends: Vec<BackendConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backends: vec![BackendConfig::File(FileSettings::default())],
        }
    }
}

/// One storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// File backend
    File(FileSettings),
    /// SQL backend
    Sql(SqlSettings),
}

impl BackendConfig {
    /// Returns whether the backend should be created.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        match self {
            Self::File(file) => file.enabled,
            Self::Sql(sql) => sql.enabled,
        }
    }

    /// Returns a label identifying the backend in logs and errors.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::File(file) => format!("file:{}", file.directory),
            Self::Sql(sql) => format!("sql:{}", sql.url),
        }
    }
}

/// File backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    /// Whether the backend is created
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log directory
    #[serde(default = "default_directory")]
    pub directory: String,

    /// `json`, `jsonl`, `csv` or `text`
    #[serde(default = "default_format")]
    pub format: String,

    /// File name template
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,
}

fn default_directory() -> String {
    DEFAULT_DIRECTORY.to_string()
}

fn default_format() -> String {
    "json".to_string()
}

fn default_filename_pattern() -> String {
    DEFAULT_FILENAME_PATTERN.to_string()
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_directory(),
            format: default_format(),
            filename_pattern: default_filename_pattern(),
        }
    }
}

impl FileSettings {
    /// Creates settings for `directory` with defaults elsewhere.
    #[must_use]
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Sets the output format name.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Sets the file name template.
    #[must_use]
    pub fn with_filename_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.filename_pattern = pattern.into();
        self
    }
}

/// SQL backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlSettings {
    /// Whether the backend is created
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Database URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Log every statement at debug level
    #[serde(default)]
    pub echo: bool,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_url(),
            echo: false,
        }
    }
}

impl SqlSettings {
    /// Creates settings for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

fn substitute_env(value: YamlValue) -> Result<YamlValue, ConfigError> {
    Ok(match value {
        YamlValue::String(s) => YamlValue::String(substitute_str(&s)?),
        YamlValue::Sequence(items) => YamlValue::Sequence(
            items
                .into_iter()
                .map(substitute_env)
                .collect::<Result<_, _>>()?,
        ),
        YamlValue::Mapping(map) => YamlValue::Mapping(
            map.into_iter()
                .map(|(k, v)| Ok((k, substitute_env(v)?)))
                .collect::<Result<_, ConfigError>>()?,
        ),
        other => other,
    })
}

fn substitute_str(input: &str) -> Result<String, ConfigError> {
    let mut missing = None;
    let replaced = ENV_REFERENCE.replace_all(input, |caps: &Captures<'_>| {
        let name = &caps[1];
        std::env::var(name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar { name }),
        None => Ok(replaced.into_owned()),
    }
}
