use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::session::FALLBACK_USER_ID;
use crate::domain::{DomainError, Notice, Surface, UserContext, UserId};
use crate::ports::{BackendApi, ReportFile};

/// Result of an upload attempt as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub notice: Option<Notice>,
    /// Where the user goes next; `None` after a failed upload.
    pub next_route: Option<&'static str>,
    pub server_message: Option<String>,
}

/// Sends report documents to the backend for parsing.
pub struct UploadSurface {
    backend: Arc<dyn BackendApi>,
    user: UserContext,
}

impl UploadSurface {
    pub fn new(backend: Arc<dyn BackendApi>, user: UserContext) -> Self {
        Self { backend, user }
    }

    /// Holding a cookie puts the user on the per-user pages, the same signal
    /// the route guard acts on.
    fn on_user_surface(&self) -> bool {
        self.user.has_credentials() || self.user.is_authenticated()
    }

    /// The page this upload is made from.
    pub fn route(&self) -> &'static str {
        Surface::Upload.route(self.on_user_surface())
    }

    /// `userId` form field: the signed-in user, or the placeholder on the
    /// user surface. Anonymous uploads carry none.
    fn upload_user(&self) -> Option<UserId> {
        if !self.on_user_surface() {
            return None;
        }
        Some(
            self.user
                .user_id()
                .cloned()
                .unwrap_or_else(|| UserId::new(FALLBACK_USER_ID)),
        )
    }

    pub async fn upload(&self, path: &Path) -> UploadOutcome {
        match self.send(path).await {
            Ok(server_message) => {
                let notice = server_message.as_ref().map(|_| Notice::info("Upload complete."));
                UploadOutcome {
                    notice,
                    next_route: Some(Surface::Chat.route(self.on_user_surface())),
                    server_message,
                }
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Upload failed");
                UploadOutcome {
                    notice: Some(Notice::from_error("Error uploading file", &e)),
                    next_route: None,
                    server_message: None,
                }
            }
        }
    }

    async fn send(&self, path: &Path) -> Result<Option<String>, DomainError> {
        let file = read_report_file(path).await?;
        let user_id = self.upload_user();
        info!(
            file_name = %file.file_name,
            bytes = file.bytes.len(),
            mime = %file.mime,
            "Uploading report"
        );
        let response = self
            .backend
            .upload_report_file(file, user_id.as_ref())
            .await?;
        Ok(response.message)
    }
}

async fn read_report_file(path: &Path) -> Result<ReportFile, DomainError> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| DomainError::Io(format!("Not a file: {}", path.display())))?;
    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(ReportFile {
        file_name,
        mime,
        bytes,
    })
}
