use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Locations of everything the client writes to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_file: PathBuf,
    /// Holds the stored session cookie.
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Default target for saved spoken replies.
    pub replies_dir: PathBuf,
}

/// Persistence for [`AppConfig`].
pub trait ConfigStore: Send + Sync {
    /// Read the config file; the first run writes and returns the defaults.
    fn load(&self) -> Result<AppConfig, DomainError>;

    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    fn paths(&self) -> &AppPaths;
}
