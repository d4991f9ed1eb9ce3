use crate::domain::{DomainError, SessionToken};

/// Persistence for the authentication cookie, the only local user state.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionToken>, DomainError>;

    fn save(&self, token: &SessionToken) -> Result<(), DomainError>;

    /// Remove any stored cookie. Succeeds when none is stored.
    fn clear(&self) -> Result<(), DomainError>;
}
