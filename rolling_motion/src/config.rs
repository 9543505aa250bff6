// THEORY:
// Tunables for a tracker and the stage that hosts it. Nothing here changes the
// semantics of the engine; the averaging window is a compile-time constant of the
// `Tracker` type, and the threshold is passed to `get_rects` on every call. The
// configured `threshold` is the value front ends pass along.

use crate::core_modules::rect::RectFilter;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "rolling_motion.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_threshold() -> u32 {
    32 * 69
}

fn default_min_rows_per_job() -> usize {
    16
}

fn default_stage_queue_depth() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Squared color distance a pixel must exceed to count as active.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Row worker count; 0 means one per CPU.
    #[serde(default)]
    pub row_jobs: usize,
    /// Rows below which splitting a frame across more workers is not worth it.
    #[serde(default = "default_min_rows_per_job")]
    pub min_rows_per_job: usize,
    /// Frames that may wait in front of a `MotionStage`.
    #[serde(default = "default_stage_queue_depth")]
    pub stage_queue_depth: usize,
    #[serde(default)]
    pub filter: RectFilter,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            row_jobs: 0,
            min_rows_per_job: default_min_rows_per_job(),
            stage_queue_depth: default_stage_queue_depth(),
            filter: RectFilter::default(),
        }
    }
}

impl TrackerConfig {
    /// Reads `rolling_motion.toml` from the working directory, falling back to
    /// the defaults when there is none.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: TrackerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_rows_per_job == 0 {
            return Err(ConfigError::Invalid("min_rows_per_job must be at least 1".into()));
        }
        if self.stage_queue_depth == 0 {
            return Err(ConfigError::Invalid("stage_queue_depth must be at least 1".into()));
        }
        if let (Some(min), Some(max)) = (self.filter.min_area, self.filter.max_area) {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "filter.min_area {min} exceeds filter.max_area {max}"
                )));
            }
        }
        if self.filter.max_squareness.is_some_and(|s| s < 1) {
            return Err(ConfigError::Invalid("filter.max_squareness must be at least 1".into()));
        }
        Ok(())
    }
}
