use async_trait::async_trait;

use crate::domain::{AuthSession, DomainError, SessionToken};

/// Port for the web app's session endpoint.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve the session a cookie belongs to. `None` means signed out.
    async fn current_session(
        &self,
        token: Option<&SessionToken>,
    ) -> Result<Option<AuthSession>, DomainError>;
}
