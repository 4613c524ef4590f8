//! Coordinator configuration.
//!
//! Values come from defaults, then environment overrides. Hosts may layer
//! their own flags on top (the daemon does this with clap).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channels::{DEFAULT_EVENT_CAPACITY, MAX_EVENT_CAPACITY};

pub const ENV_LOG_DIR: &str = "INSTALLER_LOG_DIR";
pub const ENV_EVENT_CAPACITY: &str = "INSTALLER_EVENT_CAPACITY";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings applied to every session a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Backlog of each session's event channel before slow subscribers lag.
    pub event_capacity: usize,
    /// Directory for per-session transcripts. Disabled when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            log_dir: None,
        }
    }
}

impl CoordinatorConfig {
    /// Defaults overridden by `INSTALLER_LOG_DIR` and `INSTALLER_EVENT_CAPACITY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_LOG_DIR).filter(|v| !v.trim().is_empty()) {
            config.log_dir = Some(PathBuf::from(dir));
        }

        if let Some(raw) = lookup(ENV_EVENT_CAPACITY) {
            let capacity: usize =
                raw.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: ENV_EVENT_CAPACITY,
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
            if capacity == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_EVENT_CAPACITY,
                    value: raw,
                    reason: "must be at least 1".to_string(),
                });
            }
            if capacity > MAX_EVENT_CAPACITY {
                return Err(ConfigError::InvalidValue {
                    key: ENV_EVENT_CAPACITY,
                    value: raw,
                    reason: format!("must be at most {}", MAX_EVENT_CAPACITY),
                });
            }
            config.event_capacity = capacity;
        }

        Ok(config)
    }

    /// Set the transcript directory.
    pub fn log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }

    /// Set the event channel capacity, clamped to `1..=MAX_EVENT_CAPACITY`.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.clamp(1, MAX_EVENT_CAPACITY);
        self
    }
}
