//! Persistent settings for the chart service connection and logging.
//!
//! Settings live in `<config dir>/chart-annotate/config.json`. A missing file
//! yields the defaults; command-line flags are applied on top by `main`.

use crate::error::{AnnotateError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8107";
pub const DEFAULT_PROMPT: &str = "Covert the key information of the chart to a python dict:";

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the chart service, without trailing slash.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Ask the service to order each loaded batch by file name.
    #[serde(default = "default_true")]
    pub sort_files: bool,

    /// Prompt sent with pre-annotation requests.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Confidence threshold sent with pre-annotation requests.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_threshold() -> f64 {
    0.1
}

fn default_timeout_seconds() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            sort_files: true,
            prompt: default_prompt(),
            threshold: default_threshold(),
            timeout_seconds: default_timeout_seconds(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| AnnotateError::Config("no config directory on this platform".into()))?;
        Ok(base.join("chart-annotate").join("config.json"))
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn set_service_url(&mut self, url: &str) {
        self.service_url = url.to_string();
        self.normalize();
    }

    fn normalize(&mut self) {
        while self.service_url.ends_with('/') {
            self.service_url.pop();
        }
    }
}
