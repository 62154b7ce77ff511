use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, batch_size: u32) -> OllamaClient {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "127.0.0.1".to_string(),
        port: server.address().port(),
        model: "test-model".to_string(),
        batch_size,
    };
    OllamaClient::new(&config).expect("should create client")
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
    };
    let client = OllamaClient::new(&config).expect("should create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.model_name(), "test-model");
}

#[tokio::test]
async fn embeddings_are_requested_in_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2], [0.3, 0.4]]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, 2);
    let texts: Vec<String> = (0..4).map(|i| format!("text {i}")).collect();

    let embeddings = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("blocking task should join")
        .expect("should embed texts");

    assert_eq!(embeddings.len(), 4);
    assert_eq!(embeddings[2], vec![0.1, 0.2]);
}

#[tokio::test]
async fn count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2]]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let texts = vec!["a".to_string(), "b".to_string()];

    let result = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("blocking task should join");
    assert!(result.is_err());
}

#[tokio::test]
async fn server_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let result = tokio::task::spawn_blocking(move || client.embed_query("budget"))
        .await
        .expect("blocking task should join");

    let error = result.expect_err("should surface HTTP failure");
    assert!(format!("{error:#}").contains("HTTP 500"));
}

#[test]
fn empty_batch_makes_no_request() {
    let config = OllamaConfig::default();
    let client = OllamaClient::new(&config).expect("should create client");

    let embeddings = client
        .generate_embeddings_batch(&[])
        .expect("empty batch should succeed");
    assert!(embeddings.is_empty());
}

#[tokio::test]
async fn chat_returns_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "qwen2:0.5b",
            "stream": false,
            "options": {"num_predict": 300}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen2:0.5b",
            "message": {"role": "assistant", "content": "Start with a budget."},
            "done": true
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let answer = tokio::task::spawn_blocking(move || {
        client.chat(
            "qwen2:0.5b",
            &[ChatMessage::user("How do I save?")],
            ChatOptions {
                temperature: 0.7,
                num_predict: 300,
            },
        )
    })
    .await
    .expect("blocking task should join")
    .expect("should complete chat");

    assert_eq!(answer, "Start with a budget.");
}

#[tokio::test]
async fn health_check_requires_configured_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "other-model"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("blocking task should join");
    assert!(result.is_err());
}
