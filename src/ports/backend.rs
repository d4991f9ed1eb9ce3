use std::path::Path;

use async_trait::async_trait;

use crate::domain::{
    AudioPayload, AudioReply, ChatMessage, DomainError, ReportId, TurnContext, UploadResponse,
    UserId, VoiceOptions,
};

/// Who the synthesized reply is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechTarget {
    /// A turn in a user's report conversation; the backend stores it in history.
    Conversation(TurnContext),
    /// A one-off rendering with an explicit accent and voice.
    Voice {
        accent_code: String,
        voice_name: String,
    },
}

impl SpeechTarget {
    pub fn voice(options: &VoiceOptions) -> Self {
        SpeechTarget::Voice {
            accent_code: options.accent_code.clone(),
            voice_name: options.voice_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextToVoiceRequest {
    pub text: String,
    pub target: SpeechTarget,
}

/// A report document selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Port for the report assistant backend.
///
/// Every call is a single request; implementations neither retry nor cache.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `POST /voice-to-text`: exchange recorded speech for a spoken answer.
    async fn voice_to_text(
        &self,
        payload: AudioPayload,
        context: &TurnContext,
    ) -> Result<AudioReply, DomainError>;

    /// `POST /text-to-voice`: exchange a typed question for a spoken answer.
    async fn text_to_voice(&self, request: &TextToVoiceRequest) -> Result<AudioReply, DomainError>;

    /// `POST /upload-report-file`.
    async fn upload_report_file(
        &self,
        file: ReportFile,
        user_id: Option<&UserId>,
    ) -> Result<UploadResponse, DomainError>;

    /// `GET /get-user-chat-history`.
    async fn chat_history(
        &self,
        user_id: &UserId,
        report_id: &ReportId,
    ) -> Result<Vec<ChatMessage>, DomainError>;

    /// `GET /get-user-reports`.
    async fn user_reports(&self, user_id: &UserId) -> Result<Vec<ReportId>, DomainError>;

    /// `GET /download-report`, streamed to `dest`. Returns the bytes written.
    async fn download_report(&self, report_id: &ReportId, dest: &Path) -> Result<u64, DomainError>;
}
