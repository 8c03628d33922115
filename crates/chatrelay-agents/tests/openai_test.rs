use bytes::Bytes;
use chatrelay_agents::{
    ChatMessage, ImageRequest, LlmProvider, LlmRequest, OpenAiProvider, TranscriptionRequest,
};
use chatrelay_common::Error;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_request(text: &str) -> LlmRequest {
    LlmRequest {
        model: "gpt-3.5-turbo".to_string(),
        messages: vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user(text),
        ],
        temperature: Some(0.6),
        max_tokens: None,
    }
}

#[tokio::test]
async fn test_openai_completion() {
    let mock_server = MockServer::start().await;

    let response_body = json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "gpt-3.5-turbo-0613",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "Hello there!",
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 9,
            "completion_tokens": 12,
            "total_tokens": 21
        }
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let response = provider.complete(&chat_request("Hello")).await.unwrap();

    assert_eq!(response.text, "Hello there!");
    assert_eq!(response.model, "gpt-3.5-turbo-0613");
    assert_eq!(response.stop_reason.as_deref(), Some("stop"));
    let usage = response.usage.expect("usage should be reported");
    assert_eq!(usage.input_tokens, 9);
    assert_eq!(usage.output_tokens, 12);
}

#[tokio::test]
async fn test_openai_rate_limit_maps_to_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached", "type": "requests"}
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let err = provider.complete(&chat_request("Hi")).await.unwrap_err();

    match err {
        Error::RateLimited { status_text } => assert_eq!(status_text, "Too Many Requests"),
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_server_error_maps_to_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let err = provider.complete(&chat_request("Hi")).await.unwrap_err();

    match err {
        Error::Upstream { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_connection_failure_maps_to_transport() {
    // Nothing listens on port 9 (discard) on test machines.
    let provider = OpenAiProvider::new("test-key".to_string(), Some("http://127.0.0.1:9".into()));
    let err = provider.complete(&chat_request("Hi")).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn test_openai_image_generation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .and(body_partial_json(json!({
            "prompt": "a red panda",
            "n": 1,
            "size": "512x512",
            "response_format": "url",
            "user": "relay-bot"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": 1589478378,
            "data": [{"url": "https://images.example/panda.png"}]
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let url = provider
        .generate_image(&ImageRequest {
            prompt: "a red panda".to_string(),
            user: "relay-bot".to_string(),
            size: "512x512".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(url, "https://images.example/panda.png");
}

#[tokio::test]
async fn test_openai_transcription() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "hello from a voice note"
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let text = provider
        .transcribe(&TranscriptionRequest {
            file_name: "voice.mp3".to_string(),
            audio: Bytes::from_static(b"ID3\x03\x00fake-audio"),
            model: "whisper-1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(text, "hello from a voice note");
}

#[tokio::test]
async fn test_openai_health_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    assert!(provider.health_check().await.unwrap());
}
