//! Bootstrap configuration and data folder resolution
//!
//! The TOML file is optional. A missing file is not an error: the service
//! logs a warning and starts with built-in defaults. A file that exists but
//! does not parse is an error.

use crate::time::Calendar;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "SOJOURN_DATA_FOLDER";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the local database (optional)
    ///
    /// If not specified, will attempt environment → OS default
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// SQLite file name inside the data folder
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Opaque user identifier supplied by the identity provider
    #[serde(default)]
    pub user_id: Option<String>,

    /// Remote record store (optional, local storage is used without it)
    #[serde(default)]
    pub remote: Option<RemoteConfig>,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub celebration: CelebrationConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote record store endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL, records live under `{base_url}/records/{user_id}`
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Upper bound for a single save, in milliseconds
    ///
    /// Valid range: [100, 60000]
    /// Default: 5000
    #[serde(default = "default_save_timeout_ms")]
    pub save_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_timeout_ms: default_save_timeout_ms(),
        }
    }
}

impl PersistenceConfig {
    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms.clamp(100, 60_000))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CelebrationConfig {
    /// How long a celebration stays visible without being closed
    ///
    /// Default: 5000 ms; 0 disables auto-dismiss
    #[serde(default = "default_auto_dismiss_ms")]
    pub auto_dismiss_ms: u64,
}

impl Default for CelebrationConfig {
    fn default() -> Self {
        Self {
            auto_dismiss_ms: default_auto_dismiss_ms(),
        }
    }
}

impl CelebrationConfig {
    pub fn auto_dismiss(&self) -> Option<Duration> {
        (self.auto_dismiss_ms > 0).then(|| Duration::from_millis(self.auto_dismiss_ms))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CalendarConfig {
    /// Fixed offset east of UTC used to decide which calendar day an action
    /// belongs to. Default: 0 (UTC)
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl CalendarConfig {
    pub fn calendar(&self) -> Result<Calendar> {
        Calendar::with_offset_minutes(self.utc_offset_minutes)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_database_file() -> String {
    "sojourn.db".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_save_timeout_ms() -> u64 {
    5000
}

fn default_auto_dismiss_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

impl TomlConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::defaults());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            Error::ConfigParse { source, .. } => Error::ConfigParse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|source| Error::ConfigParse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults, identical to parsing an empty file
    pub fn defaults() -> Self {
        Self {
            data_folder: None,
            database_file: default_database_file(),
            port: default_port(),
            user_id: None,
            remote: None,
            persistence: PersistenceConfig::default(),
            celebration: CelebrationConfig::default(),
            calendar: CalendarConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        self.calendar.calendar()?;
        if self.database_file.trim().is_empty() {
            return Err(Error::Config("database_file must not be empty".to_string()));
        }
        if let Some(remote) = &self.remote {
            if !(remote.base_url.starts_with("http://") || remote.base_url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "remote.base_url must be an http(s) URL: {}",
                    remote.base_url
                )));
            }
        }
        Ok(())
    }
}

/// Data folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.data_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_data_folder()
}

/// Get OS-dependent default data folder path
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sojourn"))
        .unwrap_or_else(|| PathBuf::from("./sojourn_data"))
}

/// Get default configuration file path for the platform
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("sojourn").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("sojourn.toml"))
}
