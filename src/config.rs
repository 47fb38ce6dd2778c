use anyhow::{Context, Result};
use dirs::config_dir;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::DEFAULT_BATCH_SIZE;

/// Main configuration structure for the policy updater
///
/// Passwords are never read from the file; they only come from the command line.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// MSR connection settings
    #[serde(default)]
    pub msr: MsrConfig,

    /// Update run settings
    #[serde(default)]
    pub update: UpdateSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MSR connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MsrConfig {
    /// MSR host or URL
    pub url: Option<String>,

    /// Management API username
    pub username: Option<String>,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// Per-request timeout in seconds (0 disables it)
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Update run configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UpdateSettings {
    /// Number of repositories fetched per page
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_timeout() -> u64 {
    30
}
fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MsrConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            insecure_skip_tls_verify: false,
            timeout: default_timeout(),
        }
    }
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if there is none
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load from `path` (shell-expanded) when given, otherwise the default location
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let expanded = shellexpand::full(path)
                    .with_context(|| format!("Failed to expand config path: {}", path))?;
                Self::load(Path::new(expanded.as_ref()))
            }
            None => Self::load_or_default(),
        }
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("msr-policy-updater").join("config.yml"))
    }

    /// Request timeout for the MSR client, `None` when disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.msr.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
