//! TOML-based configuration persistence for the relay.
//!
//! Reads and writes [`RelayFile`] at the platform-appropriate location:
//! - Windows:  `%APPDATA%\PointerRelay\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/pointer-relay/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/PointerRelay/config.toml`
//!
//! Example:
//!
//! ```toml
//! [relay]
//! endpoint_url = "ws://localhost:5173/mouse?source=obs"
//! enabled = true
//! publish_interval_ms = 16
//!
//! [connection]
//! connect_timeout_secs = 5
//! retry_delay_secs = 5
//!
//! [logging]
//! log_level = "info"
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section, or a
//! file written by an older version all load cleanly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pointer_core::{Config, ConfigError, PublishInterval};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::RetryPolicy;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file parsed but holds a value outside its allowed range.
    #[error("invalid config value: {0}")]
    Invalid(#[from] ConfigError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration document stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelayFile {
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// What to forward and where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelaySection {
    /// WebSocket URL of the overlay.
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    /// Master switch for capture and connection.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum spacing between `mouse` frames, 8–100 ms.
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u32,
}

/// Connection timing, in whole seconds.
///
/// `connect_timeout_secs` accepts `1..=60` and `retry_delay_secs` accepts
/// `1..=300`.  Zero is rejected: it would time out every attempt or retry
/// without pause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_endpoint_url() -> String {
    pointer_core::domain::config::DEFAULT_ENDPOINT_URL.to_string()
}
fn default_true() -> bool {
    true
}
fn default_publish_interval_ms() -> u32 {
    PublishInterval::DEFAULT_MS
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_retry_delay_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

const CONNECT_TIMEOUT_RANGE_SECS: (u64, u64) = (1, 60);
const RETRY_DELAY_RANGE_SECS: (u64, u64) = (1, 300);

fn checked_secs(field: &'static str, value: u64, (min, max): (u64, u64)) -> Result<Duration, ConfigError> {
    if (min..=max).contains(&value) {
        Ok(Duration::from_secs(value))
    } else {
        Err(ConfigError::TimingOutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            enabled: default_true(),
            publish_interval_ms: default_publish_interval_ms(),
        }
    }
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl RelayFile {
    /// Converts the `[relay]` section into a validated runtime [`Config`].
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Invalid`] when `publish_interval_ms` or either
    /// `[connection]` timing is out of range.
    pub fn to_config(&self) -> Result<Config, StorageError> {
        self.retry_policy()?;
        Ok(Config {
            endpoint_url: self.relay.endpoint_url.clone(),
            enabled: self.relay.enabled,
            publish_interval: PublishInterval::from_millis(self.relay.publish_interval_ms)?,
        })
    }

    /// Connection timings from the `[connection]` section.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Invalid`] when a timing is outside its range.
    pub fn retry_policy(&self) -> Result<RetryPolicy, StorageError> {
        Ok(RetryPolicy {
            connect_timeout: checked_secs(
                "connect_timeout_secs",
                self.connection.connect_timeout_secs,
                CONNECT_TIMEOUT_RANGE_SECS,
            )?,
            retry_delay: checked_secs(
                "retry_delay_secs",
                self.connection.retry_delay_secs,
                RETRY_DELAY_RANGE_SECS,
            )?,
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, StorageError> {
    platform_config_dir().ok_or(StorageError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads a [`RelayFile`] from `path`, returning defaults if the file does not
/// exist yet.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system errors other than "not found",
/// and [`StorageError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<RelayFile, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayFile::default()),
        Err(e) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system failures or
/// [`StorageError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &RelayFile) -> Result<(), StorageError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("PointerRelay"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("pointer-relay"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("PointerRelay")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
