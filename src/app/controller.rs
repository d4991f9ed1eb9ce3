use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{
    CpalCaptureSource, FileCredentialStore, HttpBackend, HttpSessionProvider, TomlConfigStore,
};
use crate::app::chat::ChatSurface;
use crate::app::demo::DemoSurface;
use crate::app::report_list::ReportSelector;
use crate::app::upload::UploadSurface;
use crate::app::voice_session::VoiceSessionController;
use crate::domain::{
    AppConfig, AudioDevice, AuthSession, DomainError, RouteDecision, SessionToken, UserContext,
};
use crate::infrastructure::init_logging;
use crate::ports::{
    AppPaths, BackendApi, CaptureSource, ConfigStore, CredentialStore, SessionProvider,
};

/// Per-run settings that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub backend_url: Option<String>,
    pub app_url: Option<String>,
    pub log_level: Option<String>,
    pub device: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.backend_url {
            config.backend.base_url = url.clone();
        }
        if let Some(url) = &self.app_url {
            config.auth.app_url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
    }
}

/// Application controller that orchestrates initialization and hands out surfaces.
///
/// The signed-in identity is resolved at most once per process and the same
/// [`UserContext`] is given to every surface.
pub struct AppController {
    config: RwLock<AppConfig>,
    config_store: Arc<TomlConfigStore>,
    backend: Arc<dyn BackendApi>,
    sessions: Arc<dyn SessionProvider>,
    credentials: Arc<dyn CredentialStore>,
    capture: OnceCell<Arc<dyn CaptureSource>>,
    user: OnceCell<UserContext>,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Initialize the application controller.
    /// This sets up configuration, logging, and the HTTP adapters.
    pub fn new(overrides: &ConfigOverrides) -> Result<Self, DomainError> {
        // Step 1: Initialize config store
        let config_store = Arc::new(TomlConfigStore::new()?);

        // Step 2: Load configuration, then apply this run's overrides
        let mut config = config_store.load()?;
        overrides.apply(&mut config);
        config.validate()?;

        // Step 3: Initialize logging
        let log_guard = init_logging(&config_store.paths().logs_dir, &config.logging)?;

        info!("VoiceReport starting up");

        // Step 4: Backend and session adapters
        let backend: Arc<dyn BackendApi> = Arc::new(HttpBackend::new(&config.backend)?);
        let sessions: Arc<dyn SessionProvider> = Arc::new(HttpSessionProvider::new(
            &config.auth,
            config.backend.timeout_secs,
        )?);
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(&config_store.paths().data_dir));

        info!(
            backend_url = %config.backend.base_url,
            app_url = %config.auth.app_url,
            "AppController initialized"
        );

        Ok(Self {
            config: RwLock::new(config),
            config_store,
            backend,
            sessions,
            credentials,
            capture: OnceCell::new(),
            user: OnceCell::new(),
            _log_guard: log_guard,
        })
    }

    /// Assemble a controller from already-built ports.
    #[cfg(test)]
    pub(crate) fn with_ports(
        config: AppConfig,
        config_store: Arc<TomlConfigStore>,
        backend: Arc<dyn BackendApi>,
        sessions: Arc<dyn SessionProvider>,
        credentials: Arc<dyn CredentialStore>,
        capture: Option<Arc<dyn CaptureSource>>,
    ) -> Self {
        let cell = OnceCell::new();
        if let Some(capture) = capture {
            let _ = cell.set(capture);
        }
        Self {
            config: RwLock::new(config),
            config_store,
            backend,
            sessions,
            credentials,
            capture: cell,
            user: OnceCell::new(),
            _log_guard: None,
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// The identity for this run, looked up on first use.
    ///
    /// A failed lookup is logged and treated as signed out.
    pub async fn user_context(&self) -> UserContext {
        if let Some(user) = self.user.get() {
            return user.clone();
        }

        let token = match self.credentials.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                None
            }
        };
        let has_credentials = token.is_some();
        let session = match self.sessions.current_session(token.as_ref()).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session lookup failed, continuing signed out");
                None
            }
        };

        let user = UserContext::new(session, has_credentials);
        info!(
            authenticated = user.is_authenticated(),
            user_id = ?user.user_id(),
            "User context resolved"
        );
        // A concurrent caller may have won; either value came from the same inputs.
        let _ = self.user.set(user.clone());
        user
    }

    /// Route decision for `path` given the stored cookie.
    pub async fn guard(&self, path: &str) -> RouteDecision {
        let user = self.user_context().await;
        self.config
            .read()
            .auth
            .routes
            .evaluate(path, user.has_credentials())
    }

    /// Like `guard`, but a refusal that sends the user to sign in is an error.
    pub async fn require_session(&self, path: &str) -> Result<(), DomainError> {
        match self.guard(path).await {
            RouteDecision::Redirect(to) if to == self.config.read().auth.routes.login_route => {
                debug!(path, redirect = %to, "Route needs a session");
                Err(DomainError::Unauthenticated)
            }
            _ => Ok(()),
        }
    }

    /// Store a session cookie and report who it belongs to.
    pub async fn login(&self, token: &str) -> Result<Option<AuthSession>, DomainError> {
        let token = SessionToken::new(token)?;
        self.credentials.save(&token)?;
        let session = self.sessions.current_session(Some(&token)).await?;
        match &session {
            Some(s) => info!(user_id = %s.user.id, "Signed in"),
            None => warn!("Stored cookie is not recognized by the web app"),
        }
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), DomainError> {
        self.credentials.clear()?;
        info!("Signed out");
        Ok(())
    }

    pub async fn whoami(&self) -> UserContext {
        self.user_context().await
    }

    /// The microphone source, created on first use.
    pub fn capture(&self) -> Result<Arc<dyn CaptureSource>, DomainError> {
        self.capture
            .get_or_try_init(|| {
                let audio = self.config.read().audio.clone();
                Ok::<_, DomainError>(Arc::new(CpalCaptureSource::new(audio)?) as Arc<dyn CaptureSource>)
            })
            .cloned()
    }

    fn voice_controller(&self) -> Result<Arc<VoiceSessionController>, DomainError> {
        Ok(Arc::new(VoiceSessionController::new(
            self.capture()?,
            Arc::clone(&self.backend),
        )))
    }

    pub async fn report_selector(&self) -> ReportSelector {
        let user = self.user_context().await;
        ReportSelector::new(Arc::clone(&self.backend), user.user_id().cloned())
    }

    pub async fn chat_surface(&self) -> Result<ChatSurface, DomainError> {
        let user = self.user_context().await;
        Ok(ChatSurface::new(
            Arc::clone(&self.backend),
            user,
            self.voice_controller()?,
        ))
    }

    pub async fn upload_surface(&self) -> UploadSurface {
        let user = self.user_context().await;
        UploadSurface::new(Arc::clone(&self.backend), user)
    }

    pub fn demo_surface(&self) -> Result<DemoSurface, DomainError> {
        let options = self.config.read().voice.clone();
        Ok(DemoSurface::new(
            Arc::clone(&self.backend),
            self.voice_controller()?,
            options,
        ))
    }

    pub fn list_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
        self.capture()?.list_input_devices()
    }

    /// Select the input device and remember it in the config file.
    pub fn select_device(&self, device_id: Option<&str>) -> Result<(), DomainError> {
        self.capture()?.select_input_device(device_id)?;

        let mut config = self.config.read().clone();
        config.audio.device = device_id.map(String::from);
        self.config_store.save(&config)?;
        *self.config.write() = config;

        info!(device_id = ?device_id, "Input device saved");
        Ok(())
    }

    pub fn paths(&self) -> &AppPaths {
        self.config_store.paths()
    }
}
