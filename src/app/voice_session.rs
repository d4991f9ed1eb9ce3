use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::{
    AtomicRecordingState, AudioChunk, AudioReply, DomainError, RecordingEvent, RecordingSession,
    RecordingState, TurnContext,
};
use crate::ports::{BackendApi, CaptureSource, CaptureStream};

/// A capture in progress: the open stream and the chunks buffered so far.
struct ActiveCapture {
    stream: CaptureStream,
    session: RecordingSession,
}

/// Drives one voice capture at a time from start to uploaded reply.
///
/// `Idle -> Requesting -> Capturing -> Finalizing -> Idle`. Failures on the
/// way return to `Idle`; the microphone is released on every exit from
/// `Capturing`.
pub struct VoiceSessionController {
    capture: Arc<dyn CaptureSource>,
    backend: Arc<dyn BackendApi>,
    state: AtomicRecordingState,
    active: Mutex<Option<ActiveCapture>>,
    playback: RwLock<Option<AudioReply>>,
    event_sender: broadcast::Sender<RecordingEvent>,
}

impl VoiceSessionController {
    pub fn new(capture: Arc<dyn CaptureSource>, backend: Arc<dyn BackendApi>) -> Self {
        let (event_sender, _) = broadcast::channel(64);
        Self {
            capture,
            backend,
            state: AtomicRecordingState::default(),
            active: Mutex::new(None),
            playback: RwLock::new(None),
            event_sender,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state.load()
    }

    /// Whether the start control is enabled.
    pub fn can_start(&self) -> bool {
        self.state().can_start()
    }

    /// Whether a non-interactive busy indicator should be shown.
    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_sender.subscribe()
    }

    /// The reply currently offered for playback.
    pub fn playback(&self) -> Option<AudioReply> {
        self.playback.read().clone()
    }

    pub fn set_playback(&self, reply: AudioReply) {
        *self.playback.write() = Some(reply);
    }

    pub fn clear_playback(&self) {
        self.playback.write().take();
    }

    /// Time since capture began, zero unless capturing.
    pub fn elapsed(&self) -> Duration {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.session.elapsed())
            .unwrap_or_default()
    }

    pub fn level(&self) -> f32 {
        if self.state() == RecordingState::Capturing {
            self.capture.current_level()
        } else {
            0.0
        }
    }

    /// Buffered chunks of the active capture.
    pub fn buffered_chunks(&self) -> usize {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.session.chunk_count())
            .unwrap_or(0)
    }

    fn transition(&self, from: RecordingState, to: RecordingState) -> bool {
        if !self.state.compare_exchange(from, to) {
            return false;
        }
        debug!(?from, ?to, "Recording state changed");
        let _ = self.event_sender.send(RecordingEvent::StateChanged { from, to });
        true
    }

    fn force_idle(&self) {
        let from = self.state.load();
        if from != RecordingState::Idle {
            self.state.store(RecordingState::Idle);
            let _ = self.event_sender.send(RecordingEvent::StateChanged {
                from,
                to: RecordingState::Idle,
            });
        }
    }

    fn buffer(&self, session: &mut RecordingSession, chunks: Vec<AudioChunk>) {
        for chunk in chunks {
            let len = chunk.len();
            if session.push_chunk(chunk) {
                let _ = self.event_sender.send(RecordingEvent::ChunkBuffered {
                    index: session.chunk_count() - 1,
                    len,
                });
            }
        }
    }

    /// Acquire the microphone and begin buffering.
    ///
    /// Rejected unless idle, so a second session can never overlap a first
    /// one that is still requesting, capturing or uploading. The previous
    /// playback artifact is cleared.
    pub async fn start(&self) -> Result<(), DomainError> {
        if !self.transition(RecordingState::Idle, RecordingState::Requesting) {
            warn!(state = ?self.state(), "Start rejected, session already active");
            return Err(DomainError::AlreadyRecording);
        }
        self.clear_playback();

        let stream = match self.capture.open().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Capture source unavailable");
                self.force_idle();
                return Err(e);
            }
        };

        *self.active.lock() = Some(ActiveCapture {
            stream,
            session: RecordingSession::new(self.capture.encoding()),
        });
        self.transition(RecordingState::Requesting, RecordingState::Capturing);
        info!("Recording started");
        Ok(())
    }

    /// Move chunks that have arrived into the session and publish the input level.
    ///
    /// If the device failed mid-capture, the session is abandoned, the
    /// device released and the error returned.
    pub async fn poll(&self) -> Result<usize, DomainError> {
        let failed = {
            let mut guard = self.active.lock();
            let Some(active) = guard.as_mut() else {
                return Ok(0);
            };
            let ready = active.stream.drain_ready();
            self.buffer(&mut active.session, ready);
            match active.stream.failure() {
                Some(reason) => guard.take().map(|a| (a, reason)),
                None => {
                    let _ = self.event_sender.send(RecordingEvent::LevelUpdate {
                        level: self.capture.current_level(),
                    });
                    return Ok(active.session.chunk_count());
                }
            }
        };

        if let Some((active, reason)) = failed {
            warn!(reason = %reason, "Capture failed, discarding session");
            let (_, released) = active.stream.stop().await;
            if let Err(e) = released {
                warn!(error = %e, "Microphone release failed");
            }
            self.force_idle();
            return Err(DomainError::AudioDevice { message: reason });
        }
        Ok(0)
    }

    /// Stop capturing, upload the buffered audio and keep the reply for playback.
    ///
    /// Exactly one upload is made per stop, even when nothing was captured.
    /// On failure the payload is discarded and no playback artifact is set.
    pub async fn stop(&self, context: &TurnContext) -> Result<AudioReply, DomainError> {
        if !self.transition(RecordingState::Capturing, RecordingState::Finalizing) {
            return Err(DomainError::NotRecording);
        }

        let Some(ActiveCapture { stream, mut session }) = self.active.lock().take() else {
            self.force_idle();
            return Err(DomainError::NotRecording);
        };

        let (rest, released) = stream.stop().await;
        if let Err(e) = released {
            warn!(error = %e, "Microphone release failed");
        }
        self.buffer(&mut session, rest);

        let chunks = session.chunk_count();
        let elapsed = session.elapsed();
        let payload = match session.finalize() {
            Ok(payload) => payload,
            Err(e) => {
                self.force_idle();
                return Err(e);
            }
        };

        if payload.is_empty() {
            debug!("Stopping with no buffered audio, uploading empty payload");
        }
        info!(
            chunks,
            bytes = payload.bytes.len(),
            duration_secs = elapsed.as_secs_f32(),
            "Recording stopped, uploading"
        );

        let result = self.backend.voice_to_text(payload, context).await;
        match &result {
            Ok(reply) => {
                self.set_playback(reply.clone());
                info!(bytes = reply.len(), mime = %reply.mime, "Spoken answer received");
            }
            Err(e) => warn!(error = %e, "Voice upload failed"),
        }
        self.force_idle();
        result
    }

    /// Abandon the active capture without uploading.
    pub async fn cancel(&self) -> Result<(), DomainError> {
        if !self.transition(RecordingState::Capturing, RecordingState::Finalizing) {
            return Err(DomainError::NotRecording);
        }

        let active = self.active.lock().take();
        if let Some(active) = active {
            let (_, released) = active.stream.stop().await;
            if let Err(e) = released {
                warn!(error = %e, "Microphone release failed");
            }
        }
        info!("Recording cancelled");
        self.force_idle();
        Ok(())
    }
}
