//! File storage backend with date/category rotation.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use mnemosyne_core::AuditEvent;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::StorageBackend;
use crate::error::{Result, StorageError};
use crate::format::FileFormat;

/// Default directory for audit log files.
pub const DEFAULT_DIRECTORY: &str = "./logs/audit";

/// Default file name template.
pub const DEFAULT_FILENAME_PATTERN: &str = "audit_{date}.log";

/// Default value substituted for `{app_name}`.
pub const DEFAULT_APP_NAME: &str = "audit";

#[cfg(unix)]
const DIRECTORY_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Configuration for a [`FileBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBackendConfig {
    /// Directory holding the log files
    pub directory: PathBuf,

    /// Output format
    pub format: FileFormat,

    /// File name template with `{date}`, `{category}` and `{app_name}` placeholders
    pub filename_pattern: String,

    /// Value substituted for `{app_name}`
    pub app_name: String,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            format: FileFormat::default(),
            filename_pattern: DEFAULT_FILENAME_PATTERN.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }
}

impl FileBackendConfig {
    /// Creates a configuration writing to `directory` with default settings.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the file name template.
    #[must_use]
    pub fn with_filename_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.filename_pattern = pattern.into();
        self
    }

    /// Sets the value substituted for `{app_name}`.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }
}

#[derive(Debug)]
struct ActiveFile {
    path: PathBuf,
    date: NaiveDate,
    handle: Option<File>,
}

/// Appends events to files in a directory.
///
/// One handle to the active file is cached. A single mutex guards path
/// selection, rotation and the write, so concurrent writers never interleave
/// records or duplicate a CSV header.
#[derive(Debug)]
pub struct FileBackend {
    config: FileBackendConfig,
    active: Mutex<Option<ActiveFile>>,
}

impl FileBackend {
    /// Creates the backend, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CreateDirectory`] if the directory cannot be
    /// created. Failing to restrict its permissions is only logged.
    pub fn new(config: FileBackendConfig) -> Result<Self> {
        fs::create_dir_all(&config.directory).map_err(|source| StorageError::CreateDirectory {
            path: config.directory.clone(),
            source,
        })?;

        if let Err(e) = restrict_directory(&config.directory) {
            warn!(
                directory = %config.directory.display(),
                error = %e,
                "Could not set restrictive permissions on audit log directory; logs may be readable by other users"
            );
        }

        info!(
            directory = %config.directory.display(),
            format = %config.format,
            "File storage backend initialized"
        );

        Ok(Self {
            config,
            active: Mutex::new(None),
        })
    }

    /// Returns the backend configuration.
    #[must_use]
    pub const fn config(&self) -> &FileBackendConfig {
        &self.config
    }

    /// Returns the path of the currently active file, if any.
    #[must_use]
    pub fn current_path(&self) -> Option<PathBuf> {
        self.active.lock().as_ref().map(|active| active.path.clone())
    }

    /// Computes the file an event belongs in.
    #[must_use]
    pub fn path_for(&self, event: &AuditEvent) -> PathBuf {
        let date = event.timestamp().date_naive().format("%Y-%m-%d").to_string();
        let category = event.action.category.as_str().to_lowercase();

        let filename = self
            .config
            .filename_pattern
            .replace("{date}", &date)
            .replace("{category}", &category)
            .replace("{app_name}", &self.config.app_name);

        self.config.directory.join(filename)
    }

    fn write_record(&self, active: &mut ActiveFile, event: &AuditEvent) -> Result<()> {
        let path = active.path.clone();
        let io_err = |source| StorageError::io(&path, source);

        let (mut file, had_content) = match active.handle.take() {
            Some(file) => (file, false),
            None => {
                let had_content = fs::metadata(&path).is_ok_and(|m| m.len() > 0);
                (open_append(&path).map_err(io_err)?, had_content)
            }
        };

        // A fresh append handle reports position 0 even on a non-empty file,
        // so both checks are needed.
        let at_start = file.stream_position().map_err(io_err)? == 0;
        let record = self.config.format.render(event, !had_content && at_start)?;

        file.write_all(record.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        active.handle = Some(file);
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn store(&self, event: &AuditEvent) -> Result<()> {
        if let FileFormat::Unsupported(format) = &self.config.format {
            return Err(StorageError::UnsupportedFormat {
                format: format.clone(),
            });
        }

        let path = self.path_for(event);
        let date = event.timestamp().date_naive();

        let mut guard = self.active.lock();
        let needs_rotation = !guard
            .as_ref()
            .is_some_and(|active| active.path == path && active.date == date);

        if needs_rotation {
            if let Some(previous) = guard.take() {
                release(previous, "Rotated file");
            }
        }

        let active = guard.get_or_insert_with(|| ActiveFile {
            path,
            date,
            handle: None,
        });
        self.write_record(active, event)
    }

    fn close(&self) {
        if let Some(active) = self.active.lock().take() {
            release(active, "Closed file handle");
        }
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        self.close();
    }
}

fn release(active: ActiveFile, message: &'static str) {
    let Some(mut file) = active.handle else {
        return;
    };
    match file.flush().and_then(|()| file.sync_all()) {
        Ok(()) => debug!(path = %active.path.display(), "{message}"),
        Err(e) => error!(path = %active.path.display(), error = %e, "Error closing audit log file"),
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    let is_new = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    debug!(path = %path.display(), "Opened file handle");

    if is_new {
        if let Err(e) = restrict_file(path) {
            warn!(
                path = %path.display(),
                error = %e,
                "Could not set restrictive permissions on audit log file; it may be readable by other users"
            );
        }
    }
    Ok(file)
}

#[cfg(unix)]
fn restrict_directory(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(DIRECTORY_MODE))
}

#[cfg(unix)]
fn restrict_file(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(FILE_MODE))
}

#[cfg(not(unix))]
fn restrict_directory(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
