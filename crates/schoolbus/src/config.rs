//! Configuration management for schoolbus.
//!
//! Configuration is layered with figment: defaults, then a TOML file, then
//! `SCHOOLBUS_`-prefixed environment variables.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name used under the platform config and data dirs.
const APP_DIR_NAME: &str = "schoolbus";

/// Default session file name.
const SESSION_FILE_NAME: &str = "session.json";

/// Application configuration.
///
/// Loaded from (highest precedence first):
/// 1. Environment variables (prefixed with `SCHOOLBUS_`, `__` separates sections,
///    e.g. `SCHOOLBUS_API__BASE_URL`)
/// 2. TOML config file at `~/.config/schoolbus/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend connection settings.
    pub api: ApiConfig,
    /// Scanner input settings.
    pub scanner: ScannerConfig,
    /// Session storage settings.
    pub session: SessionConfig,
    /// Report export settings.
    pub report: ReportConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend, without the `/api` suffix.
    pub base_url: String,
    /// Blanket timeout applied to every request, in seconds.
    pub timeout_secs: u64,
    /// How many times a failed read is retried. Mutations are never retried.
    pub read_retries: u32,
    /// How long fetched lists are reused before being fetched again, in seconds.
    pub cache_ttl_secs: u64,
}

/// Scanner input settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Identical decodes closer together than this are one event.
    pub debounce_ms: u64,
    /// Case-insensitive regexes identifying rear-facing camera labels.
    pub rear_camera_patterns: Vec<String>,
}

/// Session storage settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the session file.
    /// Defaults to `~/.local/share/schoolbus/session.json`
    pub path: Option<PathBuf>,
}

/// Report export settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory where CSV reports are written when no output file is given.
    /// Defaults to the current directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 15,
            read_retries: 1,
            cache_ttl_secs: 60,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            rear_camera_patterns: crate::scanner::camera::default_rear_patterns()
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("SCHOOLBUS_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(APP_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api.base_url).map_err(|e| Error::ConfigValidation {
            message: format!("api.base_url '{}' is not a URL: {e}", self.api.base_url),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::ConfigValidation {
                message: format!("api.base_url must use http or https, got '{}'", url.scheme()),
            });
        }

        if self.api.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "api.timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.scanner.debounce_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "scanner.debounce_ms must be greater than 0".to_string(),
            });
        }

        crate::scanner::camera::CameraSelector::new(&self.scanner.rear_camera_patterns)?;

        Ok(())
    }

    /// Get the session file path, resolving defaults if not set.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.session
            .path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(SESSION_FILE_NAME))
    }

    /// Get the directory for exported reports.
    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        self.report
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Get the query cache stale time as a Duration.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.api.cache_ttl_secs)
    }

    /// Get the decode debounce window as a Duration.
    #[must_use]
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.scanner.debounce_ms)
    }
}
