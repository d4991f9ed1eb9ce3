use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::app::voice_session::VoiceSessionController;
use crate::domain::{AudioReply, DomainError, Notice, TurnContext, VoiceOptions};
use crate::ports::{BackendApi, SpeechTarget, TextToVoiceRequest};

/// Anonymous try-it-out surface. Nothing is tied to a user or report.
pub struct DemoSurface {
    backend: Arc<dyn BackendApi>,
    voice: Arc<VoiceSessionController>,
    options: RwLock<VoiceOptions>,
}

impl DemoSurface {
    pub fn new(
        backend: Arc<dyn BackendApi>,
        voice: Arc<VoiceSessionController>,
        options: VoiceOptions,
    ) -> Self {
        Self {
            backend,
            voice,
            options: RwLock::new(options),
        }
    }

    pub fn voice(&self) -> &VoiceSessionController {
        &self.voice
    }

    pub fn options(&self) -> VoiceOptions {
        self.options.read().clone()
    }

    pub fn set_language(&self, code: &str) -> Result<(), DomainError> {
        self.options.write().set_language(code)
    }

    pub fn set_accent(&self, code: &str) -> Result<(), DomainError> {
        self.options.write().set_accent(code)
    }

    pub fn set_voice(&self, name: &str) -> Result<(), DomainError> {
        self.options.write().set_voice(name)
    }

    pub async fn start_voice(&self) -> Option<Notice> {
        match self.voice.start().await {
            Ok(()) => None,
            Err(e) => Some(Notice::from_error("Error starting recording", &e)),
        }
    }

    pub async fn stop_voice(&self) -> Result<AudioReply, Notice> {
        self.voice
            .stop(&TurnContext::anonymous())
            .await
            .map_err(|e| Notice::from_error("Error processing audio", &e))
    }

    /// Speak `text` back in the selected accent and voice. Blank text is ignored.
    pub async fn ask(&self, text: &str) -> Result<Option<AudioReply>, Notice> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Blank demo question ignored");
            return Ok(None);
        }

        self.voice.clear_playback();
        let options = self.options();
        let request = TextToVoiceRequest {
            text: text.to_string(),
            target: SpeechTarget::voice(&options),
        };
        let reply = self
            .backend
            .text_to_voice(&request)
            .await
            .map_err(|e| Notice::from_error("Error receiving audio", &e))?;

        info!(voice = %options.voice_name, bytes = reply.len(), "Demo answer received");
        self.voice.set_playback(reply.clone());
        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeBackend, FakeCapture};

    fn demo(capture: &Arc<FakeCapture>, backend: &Arc<FakeBackend>) -> DemoSurface {
        let voice = Arc::new(VoiceSessionController::new(capture.clone(), backend.clone()));
        DemoSurface::new(backend.clone(), voice, VoiceOptions::default())
    }

    #[tokio::test]
    async fn test_ask_sends_selected_voice() {
        let capture = Arc::new(FakeCapture::default());
        let backend = Arc::new(FakeBackend::default());
        let surface = demo(&capture, &backend);
        surface.set_accent("en-US").unwrap();

        let reply = surface.ask("read this").await.unwrap().unwrap();
        assert_eq!(surface.voice().playback(), Some(reply));

        let requests = backend.text_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].target,
            SpeechTarget::Voice {
                accent_code: "en-US".to_string(),
                voice_name: "en-US-Female".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_language_change_resets_voice() {
        let capture = Arc::new(FakeCapture::default());
        let backend = Arc::new(FakeBackend::default());
        let surface = demo(&capture, &backend);
        surface.set_voice("en-IN-Male").unwrap();

        surface.set_language("hi-IN").unwrap();
        let options = surface.options();
        assert_eq!(options.accent_code, "hi-IN");
        assert_eq!(options.voice_name, "hi-IN-Female");
        assert!(surface.set_voice("en-IN-Male").is_err());
    }

    #[tokio::test]
    async fn test_voice_turn_is_anonymous() {
        let capture = Arc::new(FakeCapture::default());
        let backend = Arc::new(FakeBackend::default());
        let surface = demo(&capture, &backend);

        assert!(surface.start_voice().await.is_none());
        capture.emit(vec![9, 9]);
        surface.stop_voice().await.unwrap();

        let uploads = backend.voice_uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1, TurnContext::anonymous());
    }

    #[tokio::test]
    async fn test_blank_question_sends_nothing() {
        let capture = Arc::new(FakeCapture::default());
        let backend = Arc::new(FakeBackend::default());
        let surface = demo(&capture, &backend);

        assert_eq!(surface.ask("").await.unwrap(), None);
        assert!(backend.text_requests().is_empty());
    }
}
