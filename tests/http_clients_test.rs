mod helpers;

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use mediascribe::application::ports::{
    AnalysisClient, AnalysisError, MediaPayload, TranscriptionEngine, TranscriptionError,
    TranscriptionOptions,
};
use mediascribe::domain::MediaArtifact;
use mediascribe::infrastructure::analysis::GeminiClient;
use mediascribe::infrastructure::transcription::OpenAiWhisperEngine;

use helpers::write_file;

#[derive(Clone, Default)]
struct Captured {
    fields: Arc<Mutex<Vec<(String, String)>>>,
    headers: Arc<Mutex<Option<HeaderMap>>>,
    body: Arc<Mutex<Option<serde_json::Value>>>,
}

async fn serve(app: Router) -> (String, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .ok();
    });

    (format!("http://{}", addr), shutdown_tx)
}

async fn start_mock_whisper(status: u16, body: &'static str) -> (String, Captured, oneshot::Sender<()>) {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/v1/audio/transcriptions",
            post(
                move |State(captured): State<Captured>, headers: HeaderMap, mut form: Multipart| async move {
                    *captured.headers.lock().unwrap() = Some(headers);
                    while let Ok(Some(field)) = form.next_field().await {
                        let name = field.name().unwrap_or_default().to_string();
                        let value = match field.file_name() {
                            Some(file_name) => format!("file:{}", file_name),
                            None => field.text().await.unwrap_or_default(),
                        };
                        captured.fields.lock().unwrap().push((name, value));
                    }
                    (StatusCode::from_u16(status).unwrap(), body).into_response()
                },
            ),
        )
        .with_state(captured.clone());
    let (base_url, shutdown) = serve(app).await;
    (format!("{}/v1", base_url), captured, shutdown)
}

async fn start_mock_gemini(
    status: u16,
    body: &'static str,
) -> (String, Captured, oneshot::Sender<()>) {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/v1beta/models/{action}",
            post(
                move |State(captured): State<Captured>,
                      headers: HeaderMap,
                      axum::Json(request): axum::Json<serde_json::Value>| async move {
                    *captured.headers.lock().unwrap() = Some(headers);
                    *captured.body.lock().unwrap() = Some(request);
                    (
                        StatusCode::from_u16(status).unwrap(),
                        [("content-type", "application/json")],
                        body,
                    )
                        .into_response()
                },
            ),
        )
        .with_state(captured.clone());
    let (base_url, shutdown) = serve(app).await;
    (format!("{}/v1beta", base_url), captured, shutdown)
}

fn artifact(dir: &std::path::Path) -> MediaArtifact {
    let path = write_file(dir, "job-audio.m4a", 64);
    MediaArtifact::new(path, 64)
}

#[tokio::test]
async fn given_audio_artifact_when_whisper_transcribes_then_text_and_hints_are_sent() {
    let (base_url, captured, shutdown) = start_mock_whisper(200, "  Hello from Whisper \n").await;
    let dir = tempfile::tempdir().unwrap();
    let engine = OpenAiWhisperEngine::new("sk-test".to_string(), Some(base_url), None);
    let options = TranscriptionOptions {
        language: Some("en".to_string()),
        prompt: Some("Speaker names: Ada".to_string()),
    };

    let text = engine.transcribe(&artifact(dir.path()), &options).await.unwrap();

    assert_eq!(text, "Hello from Whisper");
    let fields = captured.fields.lock().unwrap().clone();
    assert!(fields.contains(&("model".to_string(), "whisper-1".to_string())));
    assert!(fields.contains(&("language".to_string(), "en".to_string())));
    assert!(fields.contains(&("file".to_string(), "file:job-audio.m4a".to_string())));
    let headers = captured.headers.lock().unwrap().clone().unwrap();
    assert_eq!(headers["authorization"], "Bearer sk-test");
    shutdown.send(()).ok();
}

#[tokio::test]
async fn given_rate_limited_whisper_when_transcribing_then_rate_limited_error() {
    let (base_url, _, shutdown) = start_mock_whisper(429, "slow down").await;
    let dir = tempfile::tempdir().unwrap();
    let engine = OpenAiWhisperEngine::new("sk-test".to_string(), Some(base_url), None);

    let outcome = engine
        .transcribe(&artifact(dir.path()), &TranscriptionOptions::default())
        .await;

    assert!(matches!(outcome, Err(TranscriptionError::RateLimited)));
    shutdown.send(()).ok();
}

#[tokio::test]
async fn given_blank_whisper_response_when_transcribing_then_empty_result() {
    let (base_url, _, shutdown) = start_mock_whisper(200, "   ").await;
    let dir = tempfile::tempdir().unwrap();
    let engine = OpenAiWhisperEngine::new("sk-test".to_string(), Some(base_url), None);

    let outcome = engine
        .transcribe(&artifact(dir.path()), &TranscriptionOptions::default())
        .await;

    assert!(matches!(outcome, Err(TranscriptionError::EmptyResult)));
    shutdown.send(()).ok();
}

#[tokio::test]
async fn given_server_error_when_transcribing_then_api_error_carries_status() {
    let (base_url, _, shutdown) = start_mock_whisper(500, "boom").await;
    let dir = tempfile::tempdir().unwrap();
    let engine = OpenAiWhisperEngine::new("sk-test".to_string(), Some(base_url), None);

    let outcome = engine
        .transcribe(&artifact(dir.path()), &TranscriptionOptions::default())
        .await;

    match outcome {
        Err(TranscriptionError::ApiRequestFailed(message)) => assert!(message.contains("500")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    shutdown.send(()).ok();
}

#[tokio::test]
async fn given_media_payload_when_gemini_generates_then_inline_data_and_key_are_sent() {
    let (base_url, captured, shutdown) = start_mock_gemini(
        200,
        r##"{"candidates":[{"content":{"parts":[{"text":"# Summary"},{"text":"\n- point"}]},"finishReason":"STOP"}]}"##,
    )
    .await;
    let client = GeminiClient::new("g-key".to_string(), Some(base_url), None);
    let media = MediaPayload {
        mime_type: "audio/mp4".to_string(),
        data: b"abc".to_vec(),
    };

    let completion = client.generate("Analyze", Some(media)).await.unwrap();

    assert_eq!(completion.text.as_deref(), Some("# Summary\n- point"));
    assert!(completion.block_reason.is_none());
    let body = captured.body.lock().unwrap().clone().unwrap();
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "Analyze");
    assert_eq!(parts[1]["inline_data"]["mime_type"], "audio/mp4");
    assert_eq!(parts[1]["inline_data"]["data"], "YWJj");
    let headers = captured.headers.lock().unwrap().clone().unwrap();
    assert_eq!(headers["x-goog-api-key"], "g-key");
    shutdown.send(()).ok();
}

#[tokio::test]
async fn given_blocked_prompt_when_gemini_generates_then_block_reason_is_reported() {
    let (base_url, _, shutdown) =
        start_mock_gemini(200, r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).await;
    let client = GeminiClient::new("g-key".to_string(), Some(base_url), None);

    let completion = client.generate("Analyze this text", None).await.unwrap();

    assert_eq!(completion.block_reason.as_deref(), Some("SAFETY"));
    assert!(completion.text.is_none());
    shutdown.send(()).ok();
}

#[tokio::test]
async fn given_rate_limited_gemini_when_generating_then_rate_limited_error() {
    let (base_url, _, shutdown) = start_mock_gemini(429, r#"{}"#).await;
    let client = GeminiClient::new("g-key".to_string(), Some(base_url), None);

    let outcome = client.generate("Analyze", None).await;

    assert!(matches!(outcome, Err(AnalysisError::RateLimited)));
    shutdown.send(()).ok();
}
