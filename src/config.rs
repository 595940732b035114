//! Engine configuration
//!
//! Read from `~/.revtrack/config.json` when present. `REVTRACK_DATA_DIR`
//! overrides the data directory; CLI flags override both.

use chrono::FixedOffset;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::series::validate_label_format;
use crate::types::{Result, RevtrackError};

pub const DATA_DIR_ENV: &str = "REVTRACK_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Root of the JSONL export (`<dataDir>/<collection>/*.jsonl`)
    pub data_dir: PathBuf,
    /// Entries kept in each ranking
    pub top_n: usize,
    /// Calendar offset for period bounds and day buckets
    pub utc_offset_minutes: i32,
    /// Live recompute coalescing window
    pub debounce_ms: u64,
    pub day_label_format: String,
    pub month_label_format: String,
    /// Declared-total differences at or below this are not reported
    pub drift_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: home_dir().join("data"),
            top_n: 5,
            utc_offset_minutes: 0,
            debounce_ms: 500,
            day_label_format: "%Y-%m-%d".into(),
            month_label_format: "%Y-%m".into(),
            drift_tolerance: 0.01,
        }
    }
}

fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().join(".revtrack"))
        .unwrap_or_else(|| {
            tracing::warn!("could not determine home directory, using current directory");
            PathBuf::from(".revtrack")
        })
}

impl EngineConfig {
    /// `~/.revtrack/config.json`
    pub fn default_path() -> PathBuf {
        home_dir().join("config.json")
    }

    /// Load from the default location, then apply environment overrides.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.override_data_dir(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from));
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            RevtrackError::Config(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the data directory when a non-empty override is given
    pub fn override_data_dir(&mut self, dir: Option<PathBuf>) {
        if let Some(dir) = dir.filter(|d| !d.as_os_str().is_empty()) {
            self.data_dir = dir;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(RevtrackError::Config("topN must be at least 1".into()));
        }
        self.offset()?;
        validate_label_format(&self.day_label_format)?;
        validate_label_format(&self.month_label_format)?;
        if !self.drift_tolerance.is_finite() || self.drift_tolerance < 0.0 {
            return Err(RevtrackError::Config(
                "driftTolerance must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).ok_or_else(|| {
            RevtrackError::Config(format!(
                "utcOffsetMinutes {} out of range",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
