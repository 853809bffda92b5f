//! Configuration loading utilities
//!
//! Provides helper functions for loading configuration from various sources
//! with proper error handling and validation.

use crate::{Result, config::Settings};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "XKFW_CONFIG";

/// Configuration loader with multiple source support
#[derive(Debug)]
pub struct ConfigLoader {
    /// Default settings
    defaults: Settings,
}

impl ConfigLoader {
    /// Create new configuration loader
    pub fn new() -> Self {
        Self {
            defaults: Settings::default(),
        }
    }

    /// Platform location of the config file, whether or not it exists
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("xkfw-grabber").join("config.toml"))
    }

    /// Get the config file path from XKFW_CONFIG or the default location
    ///
    /// Priority:
    /// 1. XKFW_CONFIG environment variable
    /// 2. ~/.config/xkfw-grabber/config.toml (or platform equivalent)
    pub fn get_config_path() -> Option<PathBuf> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(config_path);
            if path.exists() {
                debug!("Using config file from {}: {:?}", CONFIG_ENV_VAR, path);
                return Some(path);
            } else {
                warn!(
                    "{} points to non-existent file: {:?}",
                    CONFIG_ENV_VAR, path
                );
            }
        }

        if let Some(default_path) = Self::default_config_path()
            && default_path.exists()
        {
            debug!("Using default config file: {:?}", default_path);
            return Some(default_path);
        }

        debug!("No config file found");
        None
    }

    /// Load configuration with precedence order:
    /// 1. Command line arguments (applied by the caller)
    /// 2. Environment variables
    /// 3. Configuration file
    /// 4. Default values (lowest priority)
    pub fn load(&self, config_file: Option<&Path>) -> Result<Settings> {
        let mut settings = self.defaults.clone();

        if let Some(path) = config_file {
            if path.exists() {
                info!("Loading configuration from file: {:?}", path);
                settings = Settings::from_file(path)?;
            } else {
                warn!("Configuration file not found: {:?}, using defaults", path);
            }
        }

        debug!("Applying environment variable overrides");
        settings = settings.merge_with_env()?;

        settings.validate()?;

        info!(
            courses = settings.courses.len(),
            "Configuration loaded successfully"
        );
        debug!("Final configuration: {:?}", settings);

        Ok(settings)
    }

    /// Write a starter config with sample courses, refusing to overwrite
    ///
    /// Returns the path written.
    pub fn write_template(&self, path: &Path) -> Result<PathBuf> {
        if path.exists() {
            return Err(crate::Error::config(
                "file",
                &format!("{} already exists", path.display()),
            ));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&Settings::template()).map_err(|e| {
            crate::Error::config("file", &format!("Failed to render template: {}", e))
        })?;
        std::fs::write(path, content)?;

        info!("Wrote configuration template to {:?}", path);
        Ok(path.to_path_buf())
    }

    /// Get default configuration
    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
