//! Engine Configuration
//!
//! Settings are read from an optional YAML file; every key has a default.
//!
//! ```yaml
//! tick_interval_ms: 1000
//! rest_between_exercises: false
//! state_dir: /home/alice/.liftrunner
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::session::RestPolicy;

/// Default directory for persisted sessions.
///
/// Resolution order:
/// 1. `LIFTRUNNER_STATE_DIR` environment variable
/// 2. `$HOME/.liftrunner` (or `%USERPROFILE%`)
/// 3. `.liftrunner` in the current directory
pub static DEFAULT_STATE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = std::env::var("LIFTRUNNER_STATE_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    match std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        Ok(home) => PathBuf::from(home).join(".liftrunner"),
        Err(_) => PathBuf::from(".liftrunner"),
    }
});

/// Engine settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Milliseconds between clock ticks; one tick counts as one second
    pub tick_interval_ms: u64,

    /// Insert a rest period between exercises, not only between sets
    pub rest_between_exercises: bool,

    /// Where the file repository keeps snapshots and active records
    pub state_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            rest_between_exercises: false,
            state_dir: DEFAULT_STATE_DIR.clone(),
        }
    }
}

impl EngineConfig {
    /// Loads settings from a YAML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Wall-clock duration of one tick. Never zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn rest_policy(&self) -> RestPolicy {
        RestPolicy {
            rest_between_exercises: self.rest_between_exercises,
        }
    }
}
