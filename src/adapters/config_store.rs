use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::{AppPaths, ConfigStore};

const APP_DIR: &str = "VoiceReport";
const CONFIG_FILE: &str = "config.toml";

impl AppPaths {
    /// Everything under one root; used by tests and portable installs.
    pub fn rooted(root: &Path) -> Self {
        Self {
            config_file: root.join(CONFIG_FILE),
            data_dir: root.to_path_buf(),
            logs_dir: root.join("logs"),
            replies_dir: root.join("replies"),
        }
    }

    /// Platform locations:
    /// - config: `<config_dir>/VoiceReport/config.toml`
    /// - data and replies: `<data_dir>/VoiceReport/`
    /// - logs: `<data_local_dir>/VoiceReport/logs/`
    pub fn platform() -> Result<Self, DomainError> {
        let config_root = dirs::config_dir()
            .ok_or_else(|| DomainError::Config("Could not find config directory".to_string()))?
            .join(APP_DIR);
        let data_root = dirs::data_dir()
            .map(|p| p.join(APP_DIR))
            .unwrap_or_else(|| config_root.clone());
        let logs_dir = dirs::data_local_dir()
            .map(|p| p.join(APP_DIR).join("logs"))
            .unwrap_or_else(|| data_root.join("logs"));

        Ok(Self {
            config_file: config_root.join(CONFIG_FILE),
            replies_dir: data_root.join("replies"),
            data_dir: data_root,
            logs_dir,
        })
    }
}

/// TOML config file at a fixed location.
pub struct TomlConfigStore {
    paths: AppPaths,
}

impl TomlConfigStore {
    pub fn new() -> Result<Self, DomainError> {
        Self::with_paths(AppPaths::platform()?)
    }

    pub fn with_paths(paths: AppPaths) -> Result<Self, DomainError> {
        fs::create_dir_all(&paths.data_dir)?;
        info!(config = ?paths.config_file, data_dir = ?paths.data_dir, "ConfigStore initialized");
        Ok(Self { paths })
    }

    fn write_atomically(&self, content: &str) -> Result<(), DomainError> {
        let target = &self.paths.config_file;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = target.with_extension("toml.tmp");
        fs::write(&staging, content)?;
        if let Err(e) = fs::rename(&staging, target) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let path = &self.paths.config_file;
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = ?path, "No config file, writing defaults");
                let config = AppConfig::new();
                self.save(&config)?;
                return Ok(config);
            }
            Err(e) => return Err(e.into()),
        };

        let config: AppConfig = toml::from_str(&content)?;
        debug!(path = ?path, "Configuration loaded");
        Ok(config)
    }

    fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
        self.write_atomically(&toml::to_string_pretty(config)?)?;
        info!(path = ?self.paths.config_file, "Configuration saved");
        Ok(())
    }

    fn paths(&self) -> &AppPaths {
        &self.paths
    }
}
