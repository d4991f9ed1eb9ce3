use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::app::report_list::ReportSelector;
use crate::app::voice_session::VoiceSessionController;
use crate::domain::{
    AudioReply, ChatLog, ChatMessage, Notice, ReportId, TurnContext, UserContext,
};
use crate::ports::{BackendApi, SpeechTarget, TextToVoiceRequest};

/// Report conversation: selected report, its chat log, and voice or typed turns.
///
/// Operations never fail outright. Errors become a [`Notice`] and the surface
/// stays usable.
pub struct ChatSurface {
    backend: Arc<dyn BackendApi>,
    user: UserContext,
    reports: ReportSelector,
    voice: Arc<VoiceSessionController>,
    log: RwLock<ChatLog>,
}

impl ChatSurface {
    pub fn new(
        backend: Arc<dyn BackendApi>,
        user: UserContext,
        voice: Arc<VoiceSessionController>,
    ) -> Self {
        let on_change = Arc::clone(&voice);
        let reports = ReportSelector::new(Arc::clone(&backend), user.user_id().cloned())
            .with_listener(Box::new(move |_: &ReportId| on_change.clear_playback()));
        Self {
            backend,
            user,
            reports,
            voice,
            log: RwLock::new(ChatLog::default()),
        }
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    pub fn reports(&self) -> &ReportSelector {
        &self.reports
    }

    pub fn voice(&self) -> &VoiceSessionController {
        &self.voice
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.log.read().messages().to_vec()
    }

    pub fn playback(&self) -> Option<AudioReply> {
        self.voice.playback()
    }

    fn turn_context(&self) -> TurnContext {
        TurnContext::for_chat(self.user.user_id(), self.reports.selected().as_ref())
    }

    /// Load the report list, picking a report if none is selected, then its history.
    pub async fn mount(&self) -> Option<Notice> {
        if let Err(e) = self.reports.load().await {
            return Some(Notice::from_error("Error fetching reports", &e));
        }
        self.refresh_history().await
    }

    /// Replace the log with the server-held history of the selected report.
    ///
    /// Nothing is fetched unless both the user and the report are known.
    pub async fn refresh_history(&self) -> Option<Notice> {
        let (Some(user_id), Some(report_id)) = (self.user.user_id(), self.reports.selected())
        else {
            debug!("User or report unknown, history not fetched");
            return None;
        };

        match self.backend.chat_history(user_id, &report_id).await {
            Ok(messages) => {
                debug!(count = messages.len(), report_id = %report_id, "History loaded");
                self.log.write().replace(messages);
                None
            }
            Err(e) => {
                warn!(error = %e, "History fetch failed");
                self.log.write().clear();
                Some(Notice::from_error("Error fetching chat history", &e))
            }
        }
    }

    /// Switch to another report and show its history.
    pub async fn select_report(&self, report_id: ReportId) -> Option<Notice> {
        self.reports.select(report_id);
        self.refresh_history().await
    }

    pub async fn start_voice(&self) -> Option<Notice> {
        match self.voice.start().await {
            Ok(()) => None,
            Err(e) => Some(Notice::from_error("Error starting recording", &e)),
        }
    }

    /// Finish the voice turn; on success the reply is the playback artifact.
    pub async fn stop_voice(&self) -> Result<AudioReply, Notice> {
        let context = self.turn_context();
        let reply = self
            .voice
            .stop(&context)
            .await
            .map_err(|e| Notice::from_error("Error processing audio", &e))?;
        if let Some(notice) = self.refresh_history().await {
            warn!(notice = %notice, "History not refreshed after voice turn");
        }
        Ok(reply)
    }

    /// Typed turn. Blank text is ignored and yields `Ok(None)`.
    pub async fn ask(&self, text: &str) -> Result<Option<AudioReply>, Notice> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Blank question ignored");
            return Ok(None);
        }

        self.voice.clear_playback();
        let request = TextToVoiceRequest {
            text: text.to_string(),
            target: SpeechTarget::Conversation(self.turn_context()),
        };
        let reply = self
            .backend
            .text_to_voice(&request)
            .await
            .map_err(|e| Notice::from_error("Error receiving audio", &e))?;

        info!(bytes = reply.len(), "Typed answer received");
        self.voice.set_playback(reply.clone());
        if let Some(notice) = self.refresh_history().await {
            warn!(notice = %notice, "History not refreshed after typed turn");
        }
        Ok(Some(reply))
    }
}
