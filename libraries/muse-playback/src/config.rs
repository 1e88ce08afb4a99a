//! Player configuration
//!
//! `PlayerConfig` is the serializable form, loaded from an optional TOML file
//! with `MUSE_*` environment overrides. `Settings` is the live, atomically
//! mutable copy shared between the controller and the player handle.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Default sync tick interval in milliseconds
const DEFAULT_SYNC_INTERVAL_MS: u64 = 250;

/// Configuration for a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Play the next muse automatically when one ends (default: false)
    pub auto_play: bool,

    /// Keep a muse's position when switching away from it (default: true)
    pub remember_time: bool,

    /// Interval of the UI sync tick in milliseconds (default: 250)
    pub sync_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            auto_play: false,
            remember_time: true,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Environment variables are prefixed with `MUSE_`, e.g. `MUSE_AUTO_PLAY=true`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(config::Environment::with_prefix("MUSE").try_parsing(true));

        let config: Self = settings
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sync_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "sync_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Sync tick interval as a `Duration`
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}

/// Live settings, readable and writable at any time from any task
#[derive(Debug)]
pub(crate) struct Settings {
    auto_play: AtomicBool,
    remember_time: AtomicBool,
    sync_interval_ms: AtomicU64,
    initial: PlayerConfig,
}

impl Settings {
    pub(crate) fn new(config: PlayerConfig) -> Self {
        Self {
            auto_play: AtomicBool::new(config.auto_play),
            remember_time: AtomicBool::new(config.remember_time),
            sync_interval_ms: AtomicU64::new(config.sync_interval_ms.max(1)),
            initial: config,
        }
    }

    pub(crate) fn auto_play(&self) -> bool {
        self.auto_play.load(Ordering::Relaxed)
    }

    pub(crate) fn set_auto_play(&self, enabled: bool) {
        self.auto_play.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn remember_time(&self) -> bool {
        self.remember_time.load(Ordering::Relaxed)
    }

    pub(crate) fn set_remember_time(&self, enabled: bool) {
        self.remember_time.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.load(Ordering::Relaxed))
    }

    /// Current values as a plain config
    pub(crate) fn snapshot(&self) -> PlayerConfig {
        PlayerConfig {
            auto_play: self.auto_play(),
            remember_time: self.remember_time(),
            sync_interval_ms: self.sync_interval_ms.load(Ordering::Relaxed),
        }
    }

    /// Restore the values the player was constructed with
    pub(crate) fn restore(&self) {
        self.set_auto_play(self.initial.auto_play);
        self.set_remember_time(self.initial.remember_time);
        self.sync_interval_ms
            .store(self.initial.sync_interval_ms.max(1), Ordering::Relaxed);
    }
}
