use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tilbot_core::llm::{ChatRequest, LlmClient, Message, OpenAIClient, SamplingParams};
use tilbot_core::TilbotError;

/// Pretends to be the completion endpoint. The model id picks the outcome.
async fn completions(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let model = body["model"].as_str().unwrap_or_default();
    match model {
        "ok" => (
            StatusCode::OK,
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": format!(
                    "echo: {}", body["messages"][1]["content"].as_str().unwrap_or_default()
                )}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            })),
        ),
        "empty" => (StatusCode::OK, Json(json!({"choices": []}))),
        "limited" => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": {"message": "rate limit"}})),
        ),
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"message": "model not found"}})),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"message": "internal"}})),
        ),
    }
}

async fn spawn_server() -> String {
    let app = Router::new().route("/v1/chat/completions", post(completions));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn request(model: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![Message::system("be helpful"), Message::user("Сәлем")],
        params: SamplingParams::default(),
    }
}

#[tokio::test]
async fn test_success_parses_content_and_usage() {
    let client = OpenAIClient::new("test-key").with_base_url(spawn_server().await);

    let response = client.chat(&request("ok")).await.unwrap();

    assert_eq!(response.content, "echo: Сәлем");
    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 12);
    assert_eq!(usage.total_tokens, 15);
}

#[tokio::test]
async fn test_429_is_rate_limited() {
    let client = OpenAIClient::new("test-key").with_base_url(spawn_server().await);

    let err = client.chat(&request("limited")).await.unwrap_err();
    assert!(matches!(err, TilbotError::RateLimited { model } if model == "limited"));
}

#[tokio::test]
async fn test_404_is_model_unavailable() {
    let client = OpenAIClient::new("test-key").with_base_url(spawn_server().await);

    let err = client.chat(&request("missing")).await.unwrap_err();
    assert!(matches!(err, TilbotError::ModelUnavailable { .. }));
}

#[tokio::test]
async fn test_other_status_keeps_code_and_body() {
    let client = OpenAIClient::new("test-key").with_base_url(spawn_server().await);

    let err = client.chat(&request("broken")).await.unwrap_err();
    match err {
        TilbotError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("internal"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_choices_is_an_error() {
    let client = OpenAIClient::new("test-key").with_base_url(spawn_server().await);

    let err = client.chat(&request("empty")).await.unwrap_err();
    assert!(matches!(err, TilbotError::Llm(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = OpenAIClient::new("test-key").with_base_url(format!("http://{addr}"));

    let err = client.chat(&request("ok")).await.unwrap_err();
    assert!(matches!(err, TilbotError::Http(_)));
}
