use anyhow::{anyhow, Context, Result};
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::charset::DetectionMode;

/// Application configuration module
/// This module handles loading, validating and saving the fetch settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Build and log requests without sending them
    #[serde(default)]
    pub dry_run: bool,

    /// Directory for saved subtitles; next to the media file when unset
    #[serde(default)]
    pub save_dir: Option<PathBuf>,

    /// Remote lookup settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Settings for the remote lookup and result processing
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchConfig {
    // @field: Seconds to wait before each attempt; its length is the attempt budget
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: Vec<u64>,

    // @field: Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Quick-ratio above which a result counts as a duplicate
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    // @field: Encoding detection strategy
    #[serde(default)]
    pub detection: DetectionMode,
}

impl FetchConfig {
    // @returns: Backoff schedule as durations
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.backoff_secs.iter().copied().map(Duration::from_secs).collect()
    }

    // @returns: Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff_secs(),
            timeout_secs: default_timeout_secs(),
            similarity_threshold: default_similarity_threshold(),
            detection: DetectionMode::default(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_backoff_secs() -> Vec<u64> {
    vec![2, 10, 30, 60, 120]
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_similarity_threshold() -> f64 {
    0.9
}

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "conf.json";

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.backoff_secs.is_empty() {
            return Err(anyhow!("fetch.backoff_secs must contain at least one attempt"));
        }

        if self.fetch.timeout_secs == 0 {
            return Err(anyhow!("fetch.timeout_secs must be greater than zero"));
        }

        let threshold = self.fetch.similarity_threshold;
        if !(0.5..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "fetch.similarity_threshold must be between 0.5 and 1.0, got {}",
                threshold
            ));
        }

        if let Some(dir) = &self.save_dir {
            if dir.is_file() {
                return Err(anyhow!("save_dir {:?} is a file", dir));
            }
        }

        Ok(())
    }

    /// Where to look for the config when no path is given: `conf.json` in
    /// the working directory, then the user config directory
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("subfetch").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
            .unwrap_or(local)
    }

    /// Read a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {:?}", path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {:?}", path))
    }

    /// Load the config, writing the defaults first when the file is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        if let Err(e) = config.save(path) {
            warn!("{:#}", e);
        }
        Ok(config)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            dry_run: false,
            save_dir: None,
            fetch: FetchConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
