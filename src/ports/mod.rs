pub mod audio;
pub mod backend;
pub mod config;
pub mod credentials;
pub mod session;

pub use audio::{CaptureHandle, CaptureSource, CaptureStream};
pub use backend::{BackendApi, ReportFile, SpeechTarget, TextToVoiceRequest};
pub use config::{AppPaths, ConfigStore};
pub use credentials::CredentialStore;
pub use session::SessionProvider;
