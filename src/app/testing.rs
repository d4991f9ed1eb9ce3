//! In-memory ports for app-layer tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use crate::domain::{
    AudioChunk, AudioDevice, AudioPayload, AudioReply, ChatMessage, ChunkEncoding, DomainError,
    ReportId, TurnContext, UploadResponse, UserId,
};
use crate::ports::{
    BackendApi, CaptureHandle, CaptureSource, CaptureStream, ReportFile, TextToVoiceRequest,
};

#[derive(Default)]
struct CaptureShared {
    opens: AtomicUsize,
    releases: AtomicUsize,
    deny: AtomicBool,
    level: Mutex<f32>,
    open_gate: Mutex<Option<Arc<Notify>>>,
    failure: Mutex<Option<String>>,
    tx: Mutex<Option<mpsc::UnboundedSender<AudioChunk>>>,
}

/// Capture source whose chunks are pushed by the test.
#[derive(Default)]
pub struct FakeCapture {
    shared: Arc<CaptureShared>,
}

impl FakeCapture {
    pub fn emit(&self, bytes: Vec<u8>) {
        if let Some(tx) = self.shared.tx.lock().as_ref() {
            let _ = tx.send(AudioChunk::new(bytes));
        }
    }

    pub fn deny(&self, deny: bool) {
        self.shared.deny.store(deny, Ordering::SeqCst);
    }

    pub fn set_level(&self, level: f32) {
        *self.shared.level.lock() = level;
    }

    /// Make `open` wait until the returned gate is notified.
    pub fn hold_open(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.shared.open_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn fail(&self, reason: &str) {
        *self.shared.failure.lock() = Some(reason.to_string());
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.shared.releases.load(Ordering::SeqCst)
    }
}

struct FakeHandle {
    shared: Arc<CaptureShared>,
    released: bool,
}

impl FakeHandle {
    fn release_now(&mut self) {
        if !self.released {
            self.released = true;
            self.shared.tx.lock().take();
            self.shared.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl CaptureHandle for FakeHandle {
    async fn release(&mut self) -> Result<(), DomainError> {
        self.release_now();
        Ok(())
    }

    fn failure(&self) -> Option<String> {
        self.shared.failure.lock().clone()
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.release_now();
    }
}

#[async_trait]
impl CaptureSource for FakeCapture {
    async fn open(&self) -> Result<CaptureStream, DomainError> {
        let gate = self.shared.open_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.shared.deny.load(Ordering::SeqCst) {
            return Err(DomainError::AudioDevice {
                message: "Permission denied".to_string(),
            });
        }
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        *self.shared.failure.lock() = None;

        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.tx.lock() = Some(tx);
        let handle = FakeHandle {
            shared: Arc::clone(&self.shared),
            released: false,
        };
        Ok(CaptureStream::new(rx, Box::new(handle)))
    }

    fn encoding(&self) -> ChunkEncoding {
        ChunkEncoding::webm()
    }

    fn current_level(&self) -> f32 {
        *self.shared.level.lock()
    }

    fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
        Ok(vec![AudioDevice {
            id: "fake".to_string(),
            name: "Fake Mic".to_string(),
            is_default: true,
        }])
    }

    fn select_input_device(&self, _device_id: Option<&str>) -> Result<(), DomainError> {
        Ok(())
    }
}

fn network_error(endpoint: &str) -> DomainError {
    DomainError::HttpStatus {
        status: 500,
        url: format!("http://backend.test{}", endpoint),
    }
}

/// Backend that records every call and answers from canned data.
#[derive(Default)]
pub struct FakeBackend {
    pub reports: Mutex<Vec<ReportId>>,
    pub history: Mutex<Vec<ChatMessage>>,
    pub upload_message: Mutex<Option<String>>,
    fail_voice: AtomicBool,
    fail_text: AtomicBool,
    fail_reports: AtomicBool,
    fail_history: AtomicBool,
    fail_upload: AtomicBool,
    voice_calls: Mutex<Vec<(AudioPayload, TurnContext)>>,
    text_calls: Mutex<Vec<TextToVoiceRequest>>,
    upload_calls: Mutex<Vec<(ReportFile, Option<UserId>)>>,
    history_calls: Mutex<Vec<(UserId, ReportId)>>,
    report_calls: AtomicUsize,
    voice_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    pub fn with_reports(ids: &[&str]) -> Self {
        let backend = Self::default();
        *backend.reports.lock() = ids.iter().map(|id| ReportId::from(*id)).collect();
        backend
    }

    pub fn set_history(&self, messages: Vec<ChatMessage>) {
        *self.history.lock() = messages;
    }

    /// Make `voice_to_text` wait, after recording the call, until the gate is notified.
    pub fn hold_voice(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.voice_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn fail_voice(&self, fail: bool) {
        self.fail_voice.store(fail, Ordering::SeqCst);
    }

    pub fn fail_text(&self, fail: bool) {
        self.fail_text.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reports(&self, fail: bool) {
        self.fail_reports.store(fail, Ordering::SeqCst);
    }

    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub fn voice_uploads(&self) -> Vec<(AudioPayload, TurnContext)> {
        self.voice_calls.lock().clone()
    }

    pub fn text_requests(&self) -> Vec<TextToVoiceRequest> {
        self.text_calls.lock().clone()
    }

    pub fn report_uploads(&self) -> Vec<(ReportFile, Option<UserId>)> {
        self.upload_calls.lock().clone()
    }

    pub fn history_requests(&self) -> Vec<(UserId, ReportId)> {
        self.history_calls.lock().clone()
    }

    pub fn report_requests(&self) -> usize {
        self.report_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn voice_to_text(
        &self,
        payload: AudioPayload,
        context: &TurnContext,
    ) -> Result<AudioReply, DomainError> {
        let size = payload.bytes.len();
        self.voice_calls.lock().push((payload, context.clone()));
        let gate = self.voice_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_voice.load(Ordering::SeqCst) {
            return Err(network_error("/voice-to-text"));
        }
        Ok(AudioReply::new(vec![0xAA; size + 1], "audio/mpeg"))
    }

    async fn text_to_voice(&self, request: &TextToVoiceRequest) -> Result<AudioReply, DomainError> {
        self.text_calls.lock().push(request.clone());
        if self.fail_text.load(Ordering::SeqCst) {
            return Err(network_error("/text-to-voice"));
        }
        Ok(AudioReply::new(request.text.as_bytes().to_vec(), "audio/mpeg"))
    }

    async fn upload_report_file(
        &self,
        file: ReportFile,
        user_id: Option<&UserId>,
    ) -> Result<UploadResponse, DomainError> {
        self.upload_calls.lock().push((file, user_id.cloned()));
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(network_error("/upload-report-file"));
        }
        Ok(UploadResponse {
            message: self.upload_message.lock().clone(),
        })
    }

    async fn chat_history(
        &self,
        user_id: &UserId,
        report_id: &ReportId,
    ) -> Result<Vec<ChatMessage>, DomainError> {
        self.history_calls.lock().push((user_id.clone(), report_id.clone()));
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(network_error("/get-user-chat-history"));
        }
        Ok(self.history.lock().clone())
    }

    async fn user_reports(&self, _user_id: &UserId) -> Result<Vec<ReportId>, DomainError> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(network_error("/get-user-reports"));
        }
        Ok(self.reports.lock().clone())
    }

    async fn download_report(&self, report_id: &ReportId, dest: &Path) -> Result<u64, DomainError> {
        let body = format!("report {}", report_id);
        std::fs::write(dest, &body)?;
        Ok(body.len() as u64)
    }
}
