pub mod audio_cpal;
pub mod config_store;
pub mod credential_store;
pub mod http_backend;
pub mod session_http;

pub use audio_cpal::CpalCaptureSource;
pub use config_store::TomlConfigStore;
pub use credential_store::FileCredentialStore;
pub use http_backend::HttpBackend;
pub use session_http::HttpSessionProvider;
