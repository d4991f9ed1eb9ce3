use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::domain::report::ReportId;
use crate::domain::DomainError;

/// Cookie carrying the web session over plain http.
pub const SESSION_COOKIE: &str = "next-auth.session-token";
/// Cookie carrying the web session over https.
pub const SECURE_SESSION_COOKIE: &str = "__Secure-next-auth.session-token";

/// Fallback identities sent by the chat surface when none is known.
pub const FALLBACK_USER_ID: &str = "user";
pub const FALLBACK_REPORT_ID: &str = "default_report";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// An authenticated web session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    pub user: SessionUser,
    pub expires: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    expires: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl AuthSession {
    /// Validate a `/api/session` body.
    ///
    /// `null`, `{}`, a missing user, or a user without an id all mean
    /// "not signed in". Anything that is not JSON is an error.
    pub fn from_response(body: &str) -> Result<Option<Self>, DomainError> {
        let body = body.trim();
        if body.is_empty() {
            return Ok(None);
        }

        let raw: Option<RawSession> = serde_json::from_str(body)
            .map_err(|e| DomainError::malformed("/api/session", e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let Some(user) = raw.user else {
            return Ok(None);
        };
        let Some(id) = user.id.filter(|id| !id.trim().is_empty()) else {
            return Ok(None);
        };

        Ok(Some(AuthSession {
            user: SessionUser {
                id: UserId::new(id),
                name: user.name,
                email: user.email,
                image: user.image,
            },
            expires: raw.expires,
        }))
    }
}

/// Identity snapshot taken once per process start and handed to every surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    session: Option<AuthSession>,
    has_credentials: bool,
}

impl UserContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(session: Option<AuthSession>, has_credentials: bool) -> Self {
        Self {
            session,
            has_credentials,
        }
    }

    pub fn authenticated(session: AuthSession) -> Self {
        Self::new(Some(session), true)
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.session.as_ref().map(|s| &s.user.id)
    }

    /// Whether a session cookie is held, the signal route guards act on.
    pub fn has_credentials(&self) -> bool {
        self.has_credentials
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Identifiers attached to a voice or typed turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnContext {
    pub user_id: Option<UserId>,
    pub report_id: Option<ReportId>,
}

impl TurnContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Chat-surface context: both identifiers always present, falling back to
    /// the placeholders the backend expects.
    pub fn for_chat(user_id: Option<&UserId>, report_id: Option<&ReportId>) -> Self {
        Self {
            user_id: Some(
                user_id
                    .cloned()
                    .unwrap_or_else(|| UserId::new(FALLBACK_USER_ID)),
            ),
            report_id: Some(
                report_id
                    .cloned()
                    .unwrap_or_else(|| ReportId::new(FALLBACK_REPORT_ID)),
            ),
        }
    }
}

/// Stored session cookie value. Zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Result<Self, DomainError> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Config("session token is empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Cookie` header value for the given app origin.
    pub fn cookie_header(&self, secure: bool) -> String {
        let name = if secure { SECURE_SESSION_COOKIE } else { SESSION_COOKIE };
        format!("{}={}", name, self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}
