use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::audio::AudioConfig;
use crate::domain::route::RouteRules;
use crate::domain::voice::VoiceOptions;
use crate::domain::DomainError;

/// Backend service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every backend endpoint is resolved against.
    pub base_url: String,
    /// Request timeout in seconds. Unset leaves it to the network stack.
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: None,
        }
    }
}

/// Web session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Origin of the web app serving `/api/session`.
    pub app_url: String,
    /// Path of the session endpoint on the web app.
    pub session_path: String,
    pub routes: RouteRules,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            app_url: "http://localhost:3000".to_string(),
            session_path: "/api/session".to_string(),
            routes: RouteRules::default(),
        }
    }
}

impl AuthConfig {
    pub fn session_url(&self) -> Result<Url, DomainError> {
        Ok(parse_base(&self.app_url)?.join(self.session_path.trim_start_matches('/'))?)
    }

    /// https origins use the `__Secure-` cookie name.
    pub fn is_secure(&self) -> bool {
        self.app_url.starts_with("https://")
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub audio: AudioConfig,
    pub voice: VoiceOptions,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed backend base URL, always ending in `/` so endpoints join under it.
    pub fn backend_url(&self) -> Result<Url, DomainError> {
        parse_base(&self.backend.base_url)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.backend_url()?;
        self.auth.session_url()?;
        self.audio.validate()?;
        self.voice.validate()
    }
}

pub(crate) fn parse_base(raw: &str) -> Result<Url, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Config("base URL is empty".to_string()));
    }
    let mut url = Url::parse(trimmed)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
