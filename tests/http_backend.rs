//! Runs the HTTP adapters against a local axum server standing in for the
//! report assistant backend and the web app session endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::json;

use voicereport::adapters::{HttpBackend, HttpSessionProvider};
use voicereport::domain::config::{AuthConfig, BackendConfig};
use voicereport::domain::{
    AudioChunk, ChatMessage, ChunkEncoding, DomainError, ErrorKind, RecordingSession, ReportId,
    Sender, SessionToken, TurnContext, UserId, VoiceOptions,
};
use voicereport::ports::{BackendApi, ReportFile, SessionProvider, SpeechTarget, TextToVoiceRequest};

/// One multipart field as the server saw it.
#[derive(Debug, Clone)]
struct FieldSeen {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct Seen {
    forms: Mutex<Vec<(String, HashMap<String, FieldSeen>)>>,
    queries: Mutex<Vec<(String, HashMap<String, String>)>>,
}

impl Seen {
    fn last_form(&self, endpoint: &str) -> HashMap<String, FieldSeen> {
        self.forms
            .lock()
            .iter()
            .rev()
            .find(|(e, _)| e == endpoint)
            .map(|(_, form)| form.clone())
            .unwrap()
    }

    fn last_query(&self, endpoint: &str) -> HashMap<String, String> {
        self.queries
            .lock()
            .iter()
            .rev()
            .find(|(e, _)| e == endpoint)
            .map(|(_, query)| query.clone())
            .unwrap()
    }
}

type Shared = Arc<Seen>;

async fn read_form(mut multipart: Multipart) -> HashMap<String, FieldSeen> {
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(String::from);
        let content_type = field.content_type().map(String::from);
        let bytes = field.bytes().await.unwrap().to_vec();
        fields.insert(
            name,
            FieldSeen {
                file_name,
                content_type,
                bytes,
            },
        );
    }
    fields
}

async fn voice_to_text(State(seen): State<Shared>, multipart: Multipart) -> impl IntoResponse {
    let form = read_form(multipart).await;
    let size = form.get("file").map(|f| f.bytes.len()).unwrap_or_default();
    seen.forms.lock().push(("voice-to-text".to_string(), form));
    (
        [(header::CONTENT_TYPE, "audio/mpeg")],
        format!("spoken answer for {} bytes", size),
    )
}

async fn text_to_voice(State(seen): State<Shared>, multipart: Multipart) -> impl IntoResponse {
    let form = read_form(multipart).await;
    seen.forms.lock().push(("text-to-voice".to_string(), form));
    ([(header::CONTENT_TYPE, "audio/wav")], vec![0x52, 0x49, 0x46, 0x46])
}

async fn upload_report_file(State(seen): State<Shared>, multipart: Multipart) -> impl IntoResponse {
    let form = read_form(multipart).await;
    seen.forms.lock().push(("upload-report-file".to_string(), form));
    Json(json!({ "message": "Report parsed" }))
}

async fn chat_history(
    State(seen): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let broken = query.get("report_id").map(String::as_str) == Some("broken");
    seen.queries.lock().push(("get-user-chat-history".to_string(), query));
    if broken {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({
        "chat_history": [
            { "sender": "user", "text": "hi" },
            { "sender": "ai", "text": null }
        ]
    }))
    .into_response()
}

async fn user_reports(
    State(seen): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let user = query.get("userId").cloned().unwrap_or_default();
    seen.queries.lock().push(("get-user-reports".to_string(), query));
    match user.as_str() {
        "new-user" => Json(json!({})).into_response(),
        _ => Json(json!({ "report_ids": ["r1", "r2"] })).into_response(),
    }
}

async fn download_report(
    State(seen): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    seen.queries.lock().push(("download-report".to_string(), query));
    ([(header::CONTENT_TYPE, "application/pdf")], b"%PDF-1.4 report body".to_vec())
}

async fn session(headers: HeaderMap) -> axum::response::Response {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if cookie == "next-auth.session-token=good" {
        Json(json!({
            "user": { "id": "u1", "name": "Ada", "email": "ada@example.com" },
            "expires": "2030-01-01T00:00:00.000Z"
        }))
        .into_response()
    } else {
        Json(json!({})).into_response()
    }
}

async fn empty_audio() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "audio/mpeg")], Vec::<u8>::new())
}

async fn not_json() -> impl IntoResponse {
    "<html>oops</html>"
}

async fn download_failure() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "report store offline")
}

/// Sends the start of a document, then drops the connection.
async fn download_cut_short() -> impl IntoResponse {
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
        Ok(b"%PDF-1.4 first half".to_vec()),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "backend went away")),
    ];
    (
        [(header::CONTENT_TYPE, "application/pdf")],
        Body::from_stream(futures_util::stream::iter(chunks)),
    )
}

async fn spawn_server() -> (String, Shared) {
    let seen: Shared = Arc::new(Seen::default());

    let faulty = Router::new()
        .route("/text-to-voice", post(empty_audio))
        .route("/get-user-reports", get(not_json))
        .route("/download-report", get(download_failure));

    let truncated = Router::new().route("/download-report", get(download_cut_short));

    let app = Router::new()
        .route("/voice-to-text", post(voice_to_text))
        .route("/text-to-voice", post(text_to_voice))
        .route("/upload-report-file", post(upload_report_file))
        .route("/get-user-chat-history", get(chat_history))
        .route("/get-user-reports", get(user_reports))
        .route("/download-report", get(download_report))
        .route("/api/session", get(session))
        .nest("/faulty", faulty)
        .nest("/truncated", truncated)
        .with_state(Arc::clone(&seen));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), seen)
}

fn backend(base_url: &str) -> HttpBackend {
    HttpBackend::new(&BackendConfig {
        base_url: base_url.to_string(),
        timeout_secs: Some(10),
    })
    .unwrap()
}

fn turn() -> TurnContext {
    TurnContext {
        user_id: Some(UserId::new("u1")),
        report_id: Some(ReportId::new("r1")),
    }
}

#[tokio::test]
async fn test_voice_upload_sends_wav_and_identifiers() {
    let (base, seen) = spawn_server().await;
    let backend = backend(&base);

    let mut session = RecordingSession::new(ChunkEncoding::Pcm16 {
        sample_rate: 16_000,
        channels: 1,
    });
    session.push_chunk(AudioChunk::from_pcm16(&[0, 1000, -1000, 0]));
    session.push_chunk(AudioChunk::from_pcm16(&[500, -500]));
    let payload = session.finalize().unwrap();

    let reply = backend.voice_to_text(payload, &turn()).await.unwrap();
    assert_eq!(reply.mime, "audio/mpeg");
    assert!(!reply.is_empty());

    let form = seen.last_form("voice-to-text");
    let file = &form["file"];
    assert_eq!(file.file_name.as_deref(), Some("voice.wav"));
    assert_eq!(file.content_type.as_deref(), Some("audio/wav"));
    let mut wav = hound::WavReader::new(std::io::Cursor::new(file.bytes.clone())).unwrap();
    assert_eq!(wav.spec().sample_rate, 16_000);
    assert_eq!(wav.spec().channels, 1);
    let samples: Vec<i16> = wav.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples, vec![0, 1000, -1000, 0, 500, -500]);
    assert_eq!(form["userId"].bytes, b"u1".to_vec());
    assert_eq!(form["reportId"].bytes, b"r1".to_vec());
}

#[tokio::test]
async fn test_anonymous_voice_upload_has_no_identifiers() {
    let (base, seen) = spawn_server().await;
    let backend = backend(&base);

    let payload = RecordingSession::new(ChunkEncoding::webm()).finalize().unwrap();
    backend
        .voice_to_text(payload, &TurnContext::anonymous())
        .await
        .unwrap();

    let form = seen.last_form("voice-to-text");
    assert!(form["file"].bytes.is_empty());
    assert!(!form.contains_key("userId"));
    assert!(!form.contains_key("reportId"));
}

#[tokio::test]
async fn test_text_to_voice_targets() {
    let (base, seen) = spawn_server().await;
    let backend = backend(&base);

    let reply = backend
        .text_to_voice(&TextToVoiceRequest {
            text: "summarize".to_string(),
            target: SpeechTarget::Conversation(turn()),
        })
        .await
        .unwrap();
    assert_eq!(reply.mime, "audio/wav");
    assert_eq!(reply.extension(), "wav");
    let form = seen.last_form("text-to-voice");
    assert_eq!(form["text"].bytes, b"summarize".to_vec());
    assert_eq!(form["userId"].bytes, b"u1".to_vec());
    assert!(!form.contains_key("accent_code"));

    backend
        .text_to_voice(&TextToVoiceRequest {
            text: "hello".to_string(),
            target: SpeechTarget::voice(&VoiceOptions::default()),
        })
        .await
        .unwrap();
    let form = seen.last_form("text-to-voice");
    assert_eq!(form["accent_code"].bytes, b"en-IN".to_vec());
    assert_eq!(form["voice_name"].bytes, b"en-IN-Female".to_vec());
    assert!(!form.contains_key("userId"));
}

#[tokio::test]
async fn test_upload_report_file() {
    let (base, seen) = spawn_server().await;
    let backend = backend(&base);

    let response = backend
        .upload_report_file(
            ReportFile {
                file_name: "q3.pdf".to_string(),
                mime: "application/pdf".to_string(),
                bytes: b"%PDF".to_vec(),
            },
            Some(&UserId::new("u1")),
        )
        .await
        .unwrap();
    assert_eq!(response.message.as_deref(), Some("Report parsed"));

    let form = seen.last_form("upload-report-file");
    assert_eq!(form["file"].file_name.as_deref(), Some("q3.pdf"));
    assert_eq!(form["file"].content_type.as_deref(), Some("application/pdf"));
    assert_eq!(form["userId"].bytes, b"u1".to_vec());
}

#[tokio::test]
async fn test_chat_history_decodes_nullable_text() {
    let (base, seen) = spawn_server().await;
    let backend = backend(&base);

    let messages = backend
        .chat_history(&UserId::new("u1"), &ReportId::new("r1"))
        .await
        .unwrap();
    assert_eq!(
        messages,
        vec![
            ChatMessage::new(Sender::User, "hi"),
            ChatMessage::new(Sender::Ai, ""),
        ]
    );
    assert_eq!(
        messages[1].display_text(),
        "AI response empty. Please retry or repeat your question."
    );

    let query = seen.last_query("get-user-chat-history");
    assert_eq!(query["user_id"], "u1");
    assert_eq!(query["report_id"], "r1");
}

#[tokio::test]
async fn test_server_error_is_network_failure() {
    let (base, _) = spawn_server().await;
    let backend = backend(&base);

    let err = backend
        .chat_history(&UserId::new("u1"), &ReportId::new("broken"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::HttpStatus { status: 500, .. }));
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_report_list_missing_key_is_empty() {
    let (base, seen) = spawn_server().await;
    let backend = backend(&base);

    let reports = backend.user_reports(&UserId::new("u1")).await.unwrap();
    assert_eq!(reports, vec![ReportId::new("r1"), ReportId::new("r2")]);
    assert_eq!(seen.last_query("get-user-reports")["userId"], "u1");

    let reports = backend.user_reports(&UserId::new("new-user")).await.unwrap();
    assert!(reports.is_empty());
}

#[tokio::test]
async fn test_malformed_bodies_are_rejected() {
    let (base, _) = spawn_server().await;
    let backend = backend(&format!("{}/faulty", base));

    let err = backend.user_reports(&UserId::new("u1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);

    let err = backend
        .text_to_voice(&TextToVoiceRequest {
            text: "hello".to_string(),
            target: SpeechTarget::voice(&VoiceOptions::default()),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_download_report_writes_file() {
    let (base, seen) = spawn_server().await;
    let backend = backend(&base);
    let temp_dir = tempfile::tempdir().unwrap();
    let dest = temp_dir.path().join("reports").join("r1.pdf");

    let written = backend
        .download_report(&ReportId::new("r1"), &dest)
        .await
        .unwrap();
    assert_eq!(written, 20);
    assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4 report body".to_vec());
    assert!(!dest.with_extension("part").exists());
    assert_eq!(seen.last_query("download-report")["report_id"], "r1");
}

#[tokio::test]
async fn test_download_error_status_keeps_existing_file() {
    let (base, _) = spawn_server().await;
    let backend = backend(&format!("{}/faulty", base));
    let temp_dir = tempfile::tempdir().unwrap();
    let dest = temp_dir.path().join("r1.pdf");
    std::fs::write(&dest, b"previous copy").unwrap();

    let err = backend
        .download_report(&ReportId::new("r1"), &dest)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::HttpStatus { status: 500, .. }));
    assert_eq!(std::fs::read(&dest).unwrap(), b"previous copy".to_vec());
    assert!(!dest.with_extension("part").exists());
}

#[tokio::test]
async fn test_download_cut_short_keeps_existing_file() {
    let (base, _) = spawn_server().await;
    let backend = backend(&format!("{}/truncated", base));
    let temp_dir = tempfile::tempdir().unwrap();
    let dest = temp_dir.path().join("r1.pdf");
    std::fs::write(&dest, b"previous copy").unwrap();

    let err = backend
        .download_report(&ReportId::new("r1"), &dest)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(std::fs::read(&dest).unwrap(), b"previous copy".to_vec());
    assert!(!dest.with_extension("part").exists());
}

#[tokio::test]
async fn test_session_lookup() {
    let (base, _) = spawn_server().await;
    let provider = HttpSessionProvider::new(
        &AuthConfig {
            app_url: base,
            ..AuthConfig::default()
        },
        Some(10),
    )
    .unwrap();

    assert!(provider.current_session(None).await.unwrap().is_none());

    let good = SessionToken::new("good").unwrap();
    let session = provider.current_session(Some(&good)).await.unwrap().unwrap();
    assert_eq!(session.user.id.as_str(), "u1");
    assert_eq!(session.user.email.as_deref(), Some("ada@example.com"));

    let stale = SessionToken::new("stale").unwrap();
    assert!(provider.current_session(Some(&stale)).await.unwrap().is_none());
}
