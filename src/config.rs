//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILHARVEST_CONFIG` (environment variable)
//! 2. `~/.config/mailharvest/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailharvest\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::export::DownloadOptions;
use crate::search::TimeBasis;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Download defaults.
    pub download: DownloadConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Where calendar days start: "local" or "utc".
    pub timezone: TimeBasis,
}

/// Download defaults, each overridable on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root folder for saved attachments.
    pub destination: Option<PathBuf>,
    /// Allowed extensions, e.g. ".pdf,.docx". Empty allows everything.
    pub file_types: String,
    /// Look back this many days when no dates are given. `0` searches all dates.
    pub default_days: Option<u32>,
    /// Pause after each saved attachment, in milliseconds.
    pub pacing_delay_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            timezone: TimeBasis::Local,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            destination: None,
            file_types: String::new(),
            default_days: Some(30),
            pacing_delay_ms: 10,
        }
    }
}

impl Config {
    /// Runtime options derived from this configuration.
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            time_basis: self.general.timezone,
            pacing_delay: Duration::from_millis(self.download.pacing_delay_ms),
        }
    }

    /// Date window to apply when the command line names no dates.
    pub fn lookback_days(&self) -> Option<u32> {
        self.download.default_days.filter(|&days| days > 0)
    }
}

/// Load configuration from `path`, or from the standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config(path: Option<&Path>) -> Config {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILHARVEST_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailharvest").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailharvest")
}

/// Configured destination, else `EmailAttachments` under the user's
/// download folder.
pub fn default_destination(config: &Config) -> Option<PathBuf> {
    config
        .download
        .destination
        .clone()
        .or_else(|| dirs::download_dir().map(|d| d.join("EmailAttachments")))
}
