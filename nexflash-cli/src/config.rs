//! Configuration file support for nexflash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (NEXFLASH_*)
//! 3. Local config file (./nexflash.toml)
//! 4. Global config file (~/.config/nexflash/config.toml)
//!
//! ```toml
//! [connection]
//! serial = "/dev/ttyUSB0"
//! baud = 921600
//!
//! [upload]
//! strict = false
//! ```

use crate::CliError;
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Local config file name, looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "nexflash.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Upload baud rate.
    pub baud: Option<u32>,
}

/// Upload behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadSection {
    /// Abort on the first unacknowledged packet.
    #[serde(default)]
    pub strict: bool,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Upload settings.
    #[serde(default)]
    pub upload: UploadSection,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    ///
    /// Unlike the implicit locations, an explicitly named file must exist and
    /// parse.
    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            CliError::Config(format!(
                "Invalid TOML in config file {}: {e}",
                path.display()
            ))
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a file, warning about unusable content.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!(
                        "Ignoring config file {}: invalid TOML: {}",
                        path.display(),
                        e
                    );
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "nexflash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other
            .connection
            .serial
            .is_some()
        {
            self.connection
                .serial = other
                .connection
                .serial;
        }
        if other
            .connection
            .baud
            .is_some()
        {
            self.connection
                .baud = other
                .connection
                .baud;
        }
        if other
            .upload
            .strict
        {
            self.upload
                .strict = true;
        }
    }
}
