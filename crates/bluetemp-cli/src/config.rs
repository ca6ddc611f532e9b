//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bluetemp_core::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::cli::{DeviceArgs, OutputFormat};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default peripheral id or address
    #[serde(default)]
    pub device: Option<String>,

    /// Default output format ("text" or "json")
    #[serde(default)]
    pub format: Option<String>,

    /// Scan timeout in milliseconds
    #[serde(default)]
    pub scan_timeout_ms: Option<u64>,

    /// Connection timeout in milliseconds
    #[serde(default)]
    pub connection_timeout_ms: Option<u64>,

    /// Database file for stored readings
    #[serde(default)]
    pub database: Option<PathBuf>,
}

impl Config {
    /// Default location of the configuration file.
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bluetemp")
            .join("config.toml")
    }

    /// Load configuration from `path`, or the default location.
    ///
    /// A missing file yields the defaults. An unreadable or malformed file
    /// is an error when the path was given explicitly and a warning
    /// otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::path();
                Self::load_from(&path).or_else(|e| {
                    tracing::warn!("Ignoring config file {}: {e:#}", path.display());
                    Ok(Self::default())
                })
            }
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Output format from the command line, falling back to the file.
    pub fn output_format(&self, flag: Option<OutputFormat>) -> OutputFormat {
        if let Some(format) = flag {
            return format;
        }
        match self.format.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("json") => OutputFormat::Json,
            Some("text") | None => OutputFormat::Text,
            Some(other) => {
                tracing::warn!("Unknown output format '{other}' in config, using text");
                OutputFormat::Text
            }
        }
    }

    /// Build the session configuration for a command.
    ///
    /// Command-line values win over file values; unset timeouts keep the
    /// library defaults.
    pub fn session_config(&self, args: &DeviceArgs) -> Result<SessionConfig> {
        let Some(device) = args.device.as_ref().or(self.device.as_ref()) else {
            bail!(
                "No device specified. Pass --device, set BLUETEMP_DEVICE, or add `device` to {}",
                Self::path().display()
            );
        };

        let mut config = SessionConfig::new(device.as_str());
        if let Some(ms) = args.scan_timeout.or(self.scan_timeout_ms) {
            config = config.scan_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = args.connect_timeout.or(self.connection_timeout_ms) {
            config = config.connection_timeout(Duration::from_millis(ms));
        }
        config.validate()?;
        Ok(config)
    }

    /// Database path from the command line, the file, or the store default.
    pub fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.database.clone())
            .unwrap_or_else(bluetemp_store::default_db_path)
    }
}
