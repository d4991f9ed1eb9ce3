pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod notice;
pub mod recording;
pub mod report;
pub mod route;
pub mod session;
pub mod voice;

pub use audio::{AudioConfig, AudioDevice, AudioReply};
pub use chat::{ChatHistoryResponse, ChatLog, ChatMessage, Sender};
pub use config::AppConfig;
pub use error::{DomainError, ErrorKind};
pub use notice::{Notice, NoticeLevel};
pub use recording::{
    AtomicRecordingState, AudioChunk, AudioPayload, ChunkEncoding, RecordingEvent,
    RecordingSession, RecordingState,
};
pub use report::{ReportId, ReportListResponse, UploadResponse};
pub use route::{RouteDecision, RouteRules, Surface};
pub use session::{AuthSession, SessionToken, TurnContext, UserContext, UserId};
pub use voice::VoiceOptions;
