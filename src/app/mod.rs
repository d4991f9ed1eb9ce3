pub mod chat;
pub mod controller;
pub mod demo;
pub mod report_list;
pub mod upload;
pub mod voice_session;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::ChatSurface;
pub use controller::{AppController, ConfigOverrides};
pub use demo::DemoSurface;
pub use report_list::ReportSelector;
pub use upload::{UploadOutcome, UploadSurface};
pub use voice_session::VoiceSessionController;
