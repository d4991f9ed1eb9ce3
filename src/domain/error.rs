use thiserror::Error;

/// Domain-level errors for VoiceReport.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Microphone unavailable: {message}")]
    AudioDevice { message: String },

    #[error("Not currently recording")]
    NotRecording,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not signed in")]
    Unauthenticated,
}

/// Coarse error taxonomy used to pick the user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Microphone or capture device could not be acquired.
    PermissionDenied,
    /// Transport failure or non-2xx status.
    Network,
    /// Body could not be decoded, or was empty where content was required.
    MalformedResponse,
    /// No authenticated session.
    Unauthenticated,
    /// Operation not valid in the current recording state.
    InvalidState,
    /// Local filesystem, configuration or encoding failure.
    Local,
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::AudioDevice { .. } => ErrorKind::PermissionDenied,
            DomainError::HttpRequest(_) | DomainError::HttpStatus { .. } => ErrorKind::Network,
            DomainError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            DomainError::Unauthenticated => ErrorKind::Unauthenticated,
            DomainError::NotRecording
            | DomainError::AlreadyRecording => ErrorKind::InvalidState,
            DomainError::Config(_)
            | DomainError::Serialization(_)
            | DomainError::Io(_)
            | DomainError::Audio(_) => ErrorKind::Local,
        }
    }

    pub(crate) fn malformed(endpoint: &str, reason: impl Into<String>) -> Self {
        DomainError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for DomainError {
    fn from(err: url::ParseError) -> Self {
        DomainError::Config(format!("Invalid URL: {}", err))
    }
}

impl From<reqwest::Error> for DomainError {
    fn from(err: reqwest::Error) -> Self {
        DomainError::HttpRequest(err.to_string())
    }
}

impl From<hound::Error> for DomainError {
    fn from(err: hound::Error) -> Self {
        DomainError::Audio(err.to_string())
    }
}
