//! Runtime relay configuration.
//!
//! [`Config`] is the single source of truth for where pointer data goes, whether
//! forwarding is enabled, and how often position updates may be published.
//! [`ConfigHolder`] shares one `Config` between the lifecycle controller (the
//! only writer) and every reader.
//!
//! # Validation
//!
//! The publish interval is a [`PublishInterval`] newtype that can only hold
//! values in `8..=100` milliseconds, so a `Config` that exists is always valid.
//! Deserialization goes through the same check (`#[serde(try_from = "u32")]`).

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default overlay endpoint.
pub const DEFAULT_ENDPOINT_URL: &str = "ws://localhost:5173/mouse?source=obs";

/// Error type for invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The publish interval is outside the supported range.
    #[error("publish interval {value}ms is outside {min}..={max}ms")]
    IntervalOutOfRange { value: u32, min: u32, max: u32 },

    /// A connection timing is outside the supported range.
    #[error("{field} = {value}s is outside {min}..={max}s")]
    TimingOutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Minimum time between two published position updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PublishInterval(u32);

impl PublishInterval {
    /// Smallest accepted interval (~120 updates per second).
    pub const MIN_MS: u32 = 8;
    /// Largest accepted interval (10 updates per second).
    pub const MAX_MS: u32 = 100;
    /// Default interval (~60 updates per second).
    pub const DEFAULT_MS: u32 = 16;

    /// Creates an interval of `ms` milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IntervalOutOfRange`] when `ms` is outside
    /// `8..=100`.
    pub fn from_millis(ms: u32) -> Result<Self, ConfigError> {
        if (Self::MIN_MS..=Self::MAX_MS).contains(&ms) {
            Ok(Self(ms))
        } else {
            Err(ConfigError::IntervalOutOfRange {
                value: ms,
                min: Self::MIN_MS,
                max: Self::MAX_MS,
            })
        }
    }

    /// Returns the interval in milliseconds.
    pub fn as_millis(self) -> u32 {
        self.0
    }

    /// Returns the interval as a [`Duration`].
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(u64::from(self.0))
    }
}

impl Default for PublishInterval {
    fn default() -> Self {
        Self(Self::DEFAULT_MS)
    }
}

impl TryFrom<u32> for PublishInterval {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_millis(value)
    }
}

impl From<PublishInterval> for u32 {
    fn from(value: PublishInterval) -> Self {
        value.0
    }
}

/// Everything the relay needs to know at runtime.
///
/// Changes take effect on the next lifecycle reconciliation, not mid-flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket URL of the overlay, e.g. `ws://localhost:5173/mouse?source=obs`.
    pub endpoint_url: String,
    /// Whether capture and forwarding should run.
    pub enabled: bool,
    /// Minimum spacing between published position updates.
    pub publish_interval: PublishInterval,
}

impl Default for Config {
    /// | Field            | Default                                 |
    /// |------------------|-----------------------------------------|
    /// | endpoint_url     | `ws://localhost:5173/mouse?source=obs`  |
    /// | enabled          | `true`                                  |
    /// | publish_interval | 16 ms                                   |
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            enabled: true,
            publish_interval: PublishInterval::default(),
        }
    }
}

/// Shared, cloneable handle to the current [`Config`].
///
/// Readers take a [`snapshot`](Self::snapshot); the lifecycle controller swaps
/// in new values with [`replace`](Self::replace).
#[derive(Debug, Clone, Default)]
pub struct ConfigHolder {
    inner: Arc<RwLock<Config>>,
}

impl ConfigHolder {
    /// Creates a holder containing `config`.
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Returns a copy of the current configuration.
    pub fn snapshot(&self) -> Config {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns whether forwarding is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled
    }

    /// Replaces the configuration and returns the previous one.
    pub fn replace(&self, config: Config) -> Config {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
