use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::domain::config::AuthConfig;
use crate::domain::{AuthSession, DomainError, SessionToken};
use crate::ports::SessionProvider;

/// Reads the signed-in user from the web app's `/api/session` endpoint.
pub struct HttpSessionProvider {
    client: Client,
    session_url: Url,
    secure: bool,
}

impl HttpSessionProvider {
    pub fn new(config: &AuthConfig, timeout_secs: Option<u64>) -> Result<Self, DomainError> {
        let session_url = config.session_url()?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("VoiceReport/{}", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| DomainError::HttpRequest(format!("Failed to create HTTP client: {}", e)))?;

        info!(session_url = %session_url, "HttpSessionProvider initialized");

        Ok(Self {
            client,
            session_url,
            secure: config.is_secure(),
        })
    }
}

#[async_trait]
impl SessionProvider for HttpSessionProvider {
    async fn current_session(
        &self,
        token: Option<&SessionToken>,
    ) -> Result<Option<AuthSession>, DomainError> {
        // Without a cookie the endpoint can only answer "signed out".
        let Some(token) = token else {
            debug!("No session cookie, skipping session lookup");
            return Ok(None);
        };

        let response = self
            .client
            .get(self.session_url.clone())
            .header(COOKIE, token.cookie_header(self.secure))
            .send()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::HttpStatus {
                status: status.as_u16(),
                url: self.session_url.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let session = AuthSession::from_response(&body)?;
        debug!(authenticated = session.is_some(), "Session resolved");
        Ok(session)
    }
}
