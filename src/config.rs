//! Persisted operator settings.
//!
//! Settings hold only file locations and clock preferences; contest data
//! lives in the participant and result lists.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    clock::{ClockMode, DEFAULT_REFRESH},
    feed::{DEFAULT_BAUD, DEFAULT_LOG_CAPACITY, FeedConfig},
};

/// File name of the settings file under the settings directory.
pub const CONFIG_FILE_NAME: &str = "chugware_config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no home directory to place settings in")]
    NoHome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub participant_file: PathBuf,
    pub result_file: PathBuf,
    pub external_clock_port: String,
    pub external_clock_baud: u32,
    pub clock_mode: ClockMode,
    pub clock: ClockSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            participant_file: PathBuf::from("participants.json"),
            result_file: PathBuf::from("results.json"),
            external_clock_port: String::new(),
            external_clock_baud: DEFAULT_BAUD,
            clock_mode: ClockMode::Internal,
            clock: ClockSettings::default(),
        }
    }
}

/// Timing knobs. Durations are stored in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub refresh_ms: u64,
    pub read_timeout_ms: u64,
    pub log_capacity: usize,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            refresh_ms: DEFAULT_REFRESH.as_millis() as u64,
            read_timeout_ms: 100,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl ClockSettings {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            read_timeout: Duration::from_millis(self.read_timeout_ms.clamp(1, 100)),
            log_capacity: self.log_capacity,
        }
    }
}

impl Settings {
    /// `~/.chugware/chugware_config.json`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        Ok(home.join(".chugware").join(CONFIG_FILE_NAME))
    }

    /// Reads settings from `path`, writing defaults there first if the file
    /// does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let settings = Self::default();
            settings.save(path)?;
            info!(path = %path.display(), "default settings written");
            return Ok(settings);
        }

        let data = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let data = serde_json::to_vec_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, data).map_err(io_err)
    }
}
