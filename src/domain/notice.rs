use std::fmt;

use crate::domain::{DomainError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Inline user-visible message raised by a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Notice for a failed operation. Microphone failures get a fixed text;
    /// everything else is prefixed with `context`.
    pub fn from_error(context: &str, err: &DomainError) -> Self {
        match err.kind() {
            ErrorKind::PermissionDenied => Self::error("Could not access microphone"),
            ErrorKind::Unauthenticated => Self::error("Please sign in to continue"),
            _ => Self::error(format!("{}: {}", context, err)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
