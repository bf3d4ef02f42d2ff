//! Integration tests for the Parley API.
//!
//! Each test builds its own router over fresh state and drives it with
//! `oneshot`, so no sockets are opened.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use parley_api::handlers::{ChatResponse, HealthResponse, TranscribeResponse};
use parley_api::{create_router, AppState, TranscriberSlot};
use parley_chat::ConversationStore;
use parley_core::config::ParleyConfig;
use parley_transcribe::{MockTranscriptionService, WhisperConfig};

// =============================================================================
// Helpers
// =============================================================================

/// Config whose model lookups can never find a real model.
fn test_config(dir: &Path) -> ParleyConfig {
    let mut config = ParleyConfig::default();
    config.generation.models_dir = dir.join("models").to_string_lossy().to_string();
    config.transcription.model_path = dir.join("missing-ggml.bin").to_string_lossy().to_string();
    config
}

fn make_state(dir: &Path) -> AppState {
    AppState::new(
        test_config(dir),
        Arc::new(ConversationStore::new()),
        Some(dir.join("chat_state.json")),
    )
}

fn mock_transcriber(dir: &Path) -> TranscriberSlot {
    TranscriberSlot::with_service(
        WhisperConfig::from(&test_config(dir).transcription),
        Arc::new(MockTranscriptionService::new()),
    )
}

fn post_json(uri: &str, json: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn post_bytes(uri: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "audio/wav")
        .body(Body::from(bytes))
        .unwrap()
}

/// A `multipart/form-data` upload with one file part named `field`.
fn post_multipart(uri: &str, field: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "parley-upload-boundary";
    let mut body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"clip.wav\"\r\n\
         Content-Type: audio/wav\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn wav_bytes(samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buf, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    buf.into_inner()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(make_state(dir.path()));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse = body_json(response).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.history_len, 0);
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_dry_run_reply() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path());
    let app = create_router(state.clone());

    let response = app
        .oneshot(post_json("/api/chat", json!({"message": "Hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: ChatResponse = body_json(response).await;
    assert_eq!(
        body.reply,
        "User: Hi\nAI: [DRY RUN] sample=True temp=0.8 top_k=0 top_p=0.92 (seq 1)"
    );
    assert_eq!(state.orchestrator.store().len(), 2);
}

#[tokio::test]
async fn test_chat_persists_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(make_state(dir.path()));

    let response = app
        .oneshot(post_json("/api/chat", json!({"message": "Hello"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let saved: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("chat_state.json")).unwrap(),
    )
    .unwrap();
    let history = saved["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], json!({"role": "user", "text": "Hello"}));
    assert_eq!(history[1]["role"], "assistant");
}

#[tokio::test]
async fn test_chat_empty_message_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path());

    for body in [json!({"message": ""}), json!({}), json!({"message": "   "})] {
        let response = create_router(state.clone())
            .oneshot(post_json("/api/chat", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: Value = body_json(response).await;
        assert_eq!(error, json!({"error": "no message"}));
    }

    assert_eq!(state.orchestrator.store().len(), 0);
    assert!(!dir.path().join("chat_state.json").exists());
}

#[tokio::test]
async fn test_chat_parameters_reach_generator() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(make_state(dir.path()));

    let response = app
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "Hi", "no_sample": true, "temperature": -1.0, "top_k": 40,
                   "num_return_sequences": 3}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: ChatResponse = body_json(response).await;
    // Temperature is normalized; the first of three candidates is returned.
    assert_eq!(
        body.reply,
        "User: Hi\nAI: [DRY RUN] sample=False temp=0.8 top_k=40 top_p=0.92 (seq 1)"
    );
}

#[tokio::test]
async fn test_chat_history_builds_across_turns() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path());

    for message in ["one", "two"] {
        let response = create_router(state.clone())
            .oneshot(post_json("/api/chat", json!({"message": message})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let history = state.orchestrator.store().snapshot();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2].text, "two");
    assert!(history[3].text.starts_with("User: one\nAI: User: one"));
}

#[tokio::test]
async fn test_chat_real_backend_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path());
    let app = create_router(state.clone());

    let response = app
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "Hi", "dry_run": false, "model": "not-installed"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let error: Value = body_json(response).await;
    assert!(error["error"].is_string());
    assert!(state.orchestrator.store().is_empty());
    assert!(state.pipelines.is_empty());
}

// =============================================================================
// Transcription
// =============================================================================

#[tokio::test]
async fn test_transcribe_missing_model() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(make_state(dir.path()));

    let response = app
        .oneshot(post_bytes("/api/transcribe", wav_bytes(&[0; 1600])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: Value = body_json(response).await;
    assert_eq!(error["error"], "transcription model not found");
    let expected = dir.path().join("missing-ggml.bin").to_string_lossy().to_string();
    assert_eq!(error["model_path"].as_str().unwrap(), expected);
    assert!(error["hint"].as_str().unwrap().contains("WHISPER_MODEL_PATH"));
}

#[tokio::test]
async fn test_transcribe_with_mock_service() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).with_transcriber(mock_transcriber(dir.path()));
    let app = create_router(state);

    let response = app
        .oneshot(post_bytes("/api/transcribe", wav_bytes(&[100; 16000])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: TranscribeResponse = body_json(response).await;
    assert_eq!(body.text, "[mock transcription]");
}

#[tokio::test]
async fn test_transcribe_multipart_file_part() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).with_transcriber(mock_transcriber(dir.path()));
    let app = create_router(state);

    let response = app
        .oneshot(post_multipart("/api/transcribe", "file", &wav_bytes(&[100; 16000])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: TranscribeResponse = body_json(response).await;
    assert_eq!(body.text, "[mock transcription]");
}

#[tokio::test]
async fn test_transcribe_multipart_without_file_part() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).with_transcriber(mock_transcriber(dir.path()));
    let app = create_router(state);

    let response = app
        .oneshot(post_multipart("/api/transcribe", "audio", &wav_bytes(&[100; 1600])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: Value = body_json(response).await;
    assert_eq!(error, json!({"error": "no audio provided"}));
}

#[tokio::test]
async fn test_transcribe_multipart_missing_model() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(make_state(dir.path()));

    let response = app
        .oneshot(post_multipart("/api/transcribe", "file", &wav_bytes(&[0; 1600])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: Value = body_json(response).await;
    assert_eq!(error["error"], "transcription model not found");
}

#[tokio::test]
async fn test_transcribe_empty_body() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).with_transcriber(mock_transcriber(dir.path()));
    let app = create_router(state);

    let response = app
        .oneshot(post_bytes("/api/transcribe", Vec::new()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: Value = body_json(response).await;
    assert_eq!(error, json!({"error": "no audio provided"}));
}

#[tokio::test]
async fn test_transcribe_invalid_audio() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).with_transcriber(mock_transcriber(dir.path()));
    let app = create_router(state);

    let response = app
        .oneshot(post_bytes("/api/transcribe", b"not a wav".to_vec()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
