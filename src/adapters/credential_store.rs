use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zeroize::Zeroize;

use crate::domain::{DomainError, SessionToken};
use crate::ports::CredentialStore;

/// Keeps the session cookie in a single owner-readable file.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("session"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<SessionToken>, DomainError> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No stored session");
            return Ok(None);
        }

        let mut content = fs::read_to_string(&self.path)?;
        let token = SessionToken::new(content.as_str()).ok();
        content.zeroize();
        Ok(token)
    }

    fn save(&self, token: &SessionToken) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token.expose())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        info!(path = ?self.path, "Session stored");
        Ok(())
    }

    fn clear(&self) -> Result<(), DomainError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = ?self.path, "Session removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(temp_dir.path());

        assert!(store.load().unwrap().is_none());

        store.save(&SessionToken::new("cookie-value").unwrap()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().expose(), "cookie-value");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_blank_file_means_no_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(temp_dir.path());
        fs::write(store.path(), "\n").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(temp_dir.path());
        store.save(&SessionToken::new("x").unwrap()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
