//! Decode policies and configuration
//!
//! Defaults stop at the first bad frame and drop leftover digits on a frame's
//! boundary line. Policies can be overridden from a JSON file or from the
//! environment:
//!
//! - `HEADAMP_FAILURE_POLICY`: `stop` | `skip`
//! - `HEADAMP_EXCESS_POLICY`: `drop` | `carry`

use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`FailurePolicy`]
pub const FAILURE_POLICY_ENV: &str = "HEADAMP_FAILURE_POLICY";

/// Environment variable overriding [`ExcessPolicy`]
pub const EXCESS_POLICY_ENV: &str = "HEADAMP_EXCESS_POLICY";

/// Date/time formats tried, in order, for the capture timestamp column.
///
/// Two-digit years come first so a four-digit year is never read as `%y`
/// followed by junk.
pub const DEFAULT_TIMESTAMP_FORMATS: &[&str] = &[
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// What to do when a frame fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// End the run at the first bad frame, keeping earlier readings
    #[default]
    Stop,
    /// Drop the bad frame and resynchronize on the next sentinel
    Skip,
}

impl FailurePolicy {
    /// Parse from environment variable string
    pub fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "stop" | "abort" | "fail" => Self::Stop,
            "skip" | "resync" | "continue" => Self::Skip,
            _ => {
                log::warn!("Unknown failure policy '{}', defaulting to 'stop'", s);
                Self::Stop
            }
        }
    }
}

/// What happens to digits left on a line after a frame completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExcessPolicy {
    /// Discard the leftover digits when the frame started and ended on the
    /// same line; otherwise they seed the next sentinel search
    #[default]
    #[value(name = "drop", alias = "drop_on_boundary_line")]
    DropOnBoundaryLine,
    /// Leftover digits always seed the next sentinel search
    Carry,
}

impl ExcessPolicy {
    /// Parse from environment variable string
    pub fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "drop" | "drop_on_boundary_line" | "compat" => Self::DropOnBoundaryLine,
            "carry" | "keep" => Self::Carry,
            _ => {
                log::warn!("Unknown excess policy '{}', defaulting to 'drop'", s);
                Self::DropOnBoundaryLine
            }
        }
    }
}

/// Errors loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid configuration JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for a decode run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Handling of frames that fail to decode
    pub failure_policy: FailurePolicy,
    /// Handling of digits left over after a frame
    pub excess_policy: ExcessPolicy,
    /// chrono formats for the timestamp column, tried in order
    pub timestamp_formats: Vec<String>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            excess_policy: ExcessPolicy::default(),
            timestamp_formats: DEFAULT_TIMESTAMP_FORMATS
                .iter()
                .map(|f| (*f).to_string())
                .collect(),
        }
    }
}

impl DecodeConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a JSON configuration file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        log::debug!("Loaded decode config from {}", path.display());
        Ok(config)
    }

    /// Override policies from `HEADAMP_*` environment variables, if set.
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(FAILURE_POLICY_ENV) {
            self.failure_policy = FailurePolicy::from_env_str(&value);
        }
        if let Ok(value) = std::env::var(EXCESS_POLICY_ENV) {
            self.excess_policy = ExcessPolicy::from_env_str(&value);
        }
    }
}
