use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use pandora_ai::{
    GeminiBackend, GeminiBackendConfig, ModelBackend, OllamaBackend, OllamaBackendConfig,
};
use pandora_core::PandoraError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral port and return its base URL
async fn spawn_mock(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn gemini(base_url: String) -> GeminiBackend {
    GeminiBackend::new(GeminiBackendConfig {
        base_url,
        api_key: "test-key".to_string(),
        model: "gemini-2.0-flash".to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn gemini_returns_first_candidate_text() {
    let router = Router::new().route(
        "/v1beta/models/gemini-2.0-flash:generateContent",
        post(
            |Query(params): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                if params.get("key").map(String::as_str) != Some("test-key") {
                    return (StatusCode::FORBIDDEN, Json(json!({"error": "bad key"})));
                }
                let prompt = body["contents"][0]["parts"][0]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                (
                    StatusCode::OK,
                    Json(json!({
                        "candidates": [{
                            "content": {"role": "model", "parts": [{"text": format!("echo: {}", prompt)}]}
                        }]
                    })),
                )
            },
        ),
    );
    let base = spawn_mock(router).await;

    let text = gemini(format!("{}/v1beta", base))
        .generate("review this")
        .await
        .unwrap();
    assert_eq!(text, "echo: review this");
}

#[tokio::test]
async fn gemini_non_success_status_is_upstream_error() {
    let router = Router::new().route(
        "/models/gemini-2.0-flash:generateContent",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "quota exceeded") }),
    );
    let base = spawn_mock(router).await;

    match gemini(base).generate("x").await {
        Err(PandoraError::Upstream(msg)) => {
            assert!(msg.contains("500"));
            assert!(msg.contains("quota exceeded"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn gemini_malformed_envelope_is_upstream_error() {
    let router = Router::new().route(
        "/models/gemini-2.0-flash:generateContent",
        post(|| async { Json(json!({"candidates": []})) }),
    );
    let base = spawn_mock(router).await;

    assert!(matches!(
        gemini(base).generate("x").await,
        Err(PandoraError::Upstream(_))
    ));
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gemini(format!("http://{}", addr))
        .generate("x")
        .await
        .unwrap_err();
    assert!(matches!(err, PandoraError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn slow_provider_times_out_as_network_error() {
    let router = Router::new().route(
        "/api/generate",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"response": "too late"}))
        }),
    );
    let base = spawn_mock(router).await;

    let backend = OllamaBackend::new(OllamaBackendConfig {
        base_url: base,
        timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .unwrap();

    match backend.generate("x").await {
        Err(PandoraError::Network(msg)) => assert!(msg.contains("timeout")),
        other => panic!("expected network timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn ollama_reads_response_field() {
    let router = Router::new().route(
        "/api/generate",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["stream"], false);
            Json(json!({
                "model": body["model"],
                "response": "1. Complexity: low",
                "done": true,
                "eval_count": 7
            }))
        }),
    );
    let base = spawn_mock(router).await;

    let backend = OllamaBackend::new(OllamaBackendConfig {
        base_url: base,
        ..Default::default()
    })
    .unwrap();

    assert_eq!(backend.generate("x").await.unwrap(), "1. Complexity: low");
    assert_eq!(backend.backend_name(), "ollama");
}

#[tokio::test]
async fn ollama_error_status_is_upstream_error() {
    let router = Router::new().route(
        "/api/generate",
        post(|| async { (StatusCode::NOT_FOUND, "model not found") }),
    );
    let base = spawn_mock(router).await;

    let backend = OllamaBackend::new(OllamaBackendConfig {
        base_url: base,
        ..Default::default()
    })
    .unwrap();

    assert!(matches!(
        backend.generate("x").await,
        Err(PandoraError::Upstream(_))
    ));
}
