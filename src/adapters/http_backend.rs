use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::domain::config::BackendConfig;
use crate::domain::{
    AudioPayload, AudioReply, ChatHistoryResponse, ChatMessage, DomainError, ReportId,
    ReportListResponse, TurnContext, UploadResponse, UserId,
};
use crate::ports::{BackendApi, ReportFile, SpeechTarget, TextToVoiceRequest};

/// Reply type assumed when the backend omits `Content-Type`.
const DEFAULT_REPLY_MIME: &str = "audio/mpeg";

/// reqwest-backed client for the report assistant backend.
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, DomainError> {
        let base = crate::domain::config::parse_base(&config.base_url)?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("VoiceReport/{}", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| DomainError::HttpRequest(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url = %base, timeout_secs = ?config.timeout_secs, "HttpBackend initialized");

        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DomainError> {
        Ok(self.base.join(path)?)
    }

    /// Send a request; transport errors and non-2xx statuses are network failures.
    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response, DomainError> {
        let response = request
            .send()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        debug!(url = %url, status = status.as_u16(), "Backend responded");
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T, DomainError> {
        let body = response
            .bytes()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| DomainError::malformed(endpoint, e.to_string()))
    }

    async fn read_audio(response: Response, endpoint: &str) -> Result<AudioReply, DomainError> {
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_REPLY_MIME)
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        if body.is_empty() {
            return Err(DomainError::malformed(endpoint, "empty audio body"));
        }

        Ok(AudioReply::new(body.to_vec(), mime))
    }

    fn file_part(bytes: Vec<u8>, file_name: &str, mime: &str) -> Result<Part, DomainError> {
        Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| DomainError::HttpRequest(format!("Invalid content type {}: {}", mime, e)))
    }
}

fn with_turn_context(mut form: Form, context: &TurnContext) -> Form {
    if let Some(user_id) = &context.user_id {
        form = form.text("userId", user_id.as_str().to_string());
    }
    if let Some(report_id) = &context.report_id {
        form = form.text("reportId", report_id.as_str().to_string());
    }
    form
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn voice_to_text(
        &self,
        payload: AudioPayload,
        context: &TurnContext,
    ) -> Result<AudioReply, DomainError> {
        let url = self.endpoint("voice-to-text")?;
        let size = payload.bytes.len();

        let part = Self::file_part(payload.bytes, &payload.file_name, &payload.mime)?;
        let form = with_turn_context(Form::new().part("file", part), context);

        info!(url = %url, bytes = size, "Uploading recorded audio");
        let response = self.send(self.client.post(url.clone()).multipart(form), &url).await?;
        Self::read_audio(response, "/voice-to-text").await
    }

    async fn text_to_voice(&self, request: &TextToVoiceRequest) -> Result<AudioReply, DomainError> {
        let url = self.endpoint("text-to-voice")?;

        let mut form = Form::new().text("text", request.text.clone());
        form = match &request.target {
            SpeechTarget::Conversation(context) => with_turn_context(form, context),
            SpeechTarget::Voice {
                accent_code,
                voice_name,
            } => form
                .text("accent_code", accent_code.clone())
                .text("voice_name", voice_name.clone()),
        };

        info!(url = %url, chars = request.text.chars().count(), "Requesting spoken answer");
        let response = self.send(self.client.post(url.clone()).multipart(form), &url).await?;
        Self::read_audio(response, "/text-to-voice").await
    }

    async fn upload_report_file(
        &self,
        file: ReportFile,
        user_id: Option<&UserId>,
    ) -> Result<UploadResponse, DomainError> {
        let url = self.endpoint("upload-report-file")?;
        let size = file.bytes.len();

        let part = Self::file_part(file.bytes, &file.file_name, &file.mime)?;
        let mut form = Form::new().part("file", part);
        if let Some(user_id) = user_id {
            form = form.text("userId", user_id.as_str().to_string());
        }

        info!(url = %url, file = %file.file_name, bytes = size, "Uploading report");
        let response = self.send(self.client.post(url.clone()).multipart(form), &url).await?;
        Self::read_json(response, "/upload-report-file").await
    }

    async fn chat_history(
        &self,
        user_id: &UserId,
        report_id: &ReportId,
    ) -> Result<Vec<ChatMessage>, DomainError> {
        let mut url = self.endpoint("get-user-chat-history")?;
        url.query_pairs_mut()
            .append_pair("user_id", user_id.as_str())
            .append_pair("report_id", report_id.as_str());

        let response = self.send(self.client.get(url.clone()), &url).await?;
        let parsed: ChatHistoryResponse = Self::read_json(response, "/get-user-chat-history").await?;
        debug!(messages = parsed.chat_history.len(), "Chat history fetched");
        Ok(parsed.chat_history)
    }

    async fn user_reports(&self, user_id: &UserId) -> Result<Vec<ReportId>, DomainError> {
        let mut url = self.endpoint("get-user-reports")?;
        url.query_pairs_mut().append_pair("userId", user_id.as_str());

        let response = self.send(self.client.get(url.clone()), &url).await?;
        let parsed: ReportListResponse = Self::read_json(response, "/get-user-reports").await?;
        debug!(reports = parsed.report_ids.len(), "Report list fetched");
        Ok(parsed.report_ids)
    }

    async fn download_report(&self, report_id: &ReportId, path: &Path) -> Result<u64, DomainError> {
        let mut url = self.endpoint("download-report")?;
        url.query_pairs_mut().append_pair("report_id", report_id.as_str());

        let response = self.send(self.client.get(url.clone()), &url).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Partial downloads never replace an existing file.
        let partial = path.with_extension("part");
        let downloaded = match stream_to_file(response, &partial).await {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        if let Err(e) = tokio::fs::rename(&partial, path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        info!(report_id = %report_id, path = ?path, size = downloaded, "Report downloaded");
        Ok(downloaded)
    }
}

async fn stream_to_file(response: Response, path: &Path) -> Result<u64, DomainError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
