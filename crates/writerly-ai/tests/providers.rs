//! Adapter behaviour against local mock HTTP servers.

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};
use writerly_ai::{AnthropicProvider, GeminiProvider, OllamaProvider, OpenAiProvider};
use writerly_core::{
    CompletionProvider, CompletionRequest, GenerationRequest, Orchestrator, ProviderConfig, ProviderFailure,
    ProviderRegistry, Task, WriterlyConfig,
};

fn config(server: &MockServer, key: &str) -> ProviderConfig {
    ProviderConfig::new(key, "").with_base_url(server.uri()).with_timeout(5)
}

#[tokio::test]
async fn openai_sends_bearer_and_json_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "Say hi"}],
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"suggestions\": []}"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(config(&server, "sk-test")).unwrap();
    let text = provider
        .complete(CompletionRequest::new("Say hi").with_force_json(true))
        .await
        .unwrap();

    assert_eq!(text, "{\"suggestions\": []}");
}

#[tokio::test]
async fn openai_error_carries_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(config(&server, "sk-bad")).unwrap();
    let err = provider.complete(CompletionRequest::new("x")).await.unwrap_err();

    match err {
        ProviderFailure::Api { provider, status, message } => {
            assert_eq!(provider, "openai");
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn anthropic_headers_and_default_max_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"max_tokens": 512, "temperature": 0.5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Clear "},
                {"type": "text", "text": "and concise."}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new(config(&server, "ak-test")).unwrap();
    let text = provider
        .complete(CompletionRequest::new("Tighten").with_temperature(0.5))
        .await
        .unwrap();

    assert_eq!(text, "Clear and concise.");
}

#[tokio::test]
async fn gemini_key_in_header_and_generation_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "g-key"))
        .and(query_param_is_missing("key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Summarize"}]}],
            "generationConfig": {"maxOutputTokens": 100}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Short "}, {"text": "summary."}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(config(&server, "g-key")).unwrap();
    let text = provider
        .complete(CompletionRequest::new("Summarize").with_max_tokens(Some(100)))
        .await
        .unwrap();

    assert_eq!(text, "Short summary.");
}

#[tokio::test]
async fn gemini_unparsable_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(config(&server, "g-key")).unwrap();
    let err = provider.complete(CompletionRequest::new("x")).await.unwrap_err();
    assert!(matches!(err, ProviderFailure::InvalidResponse { .. }));
}

#[tokio::test]
async fn gemini_network_error_hides_api_key() {
    let config = ProviderConfig::new("SECRET-KEY-123", "")
        .with_base_url("http://127.0.0.1:9")
        .with_timeout(5);
    let mut registry = ProviderRegistry::new();
    registry.register_arc(Arc::new(GeminiProvider::new(config).unwrap()));
    let orchestrator = Orchestrator::new(registry, WriterlyConfig::default());

    let result = orchestrator
        .generate(GenerationRequest::new("u1").with_instruction("Hi"))
        .await
        .unwrap();

    assert_eq!(result.provider, "fallback");
    let error = result.error.unwrap();
    assert!(error.starts_with("gemini"), "{error}");
    assert!(!error.contains("SECRET-KEY-123"), "{error}");
    assert!(!error.contains("127.0.0.1"), "{error}");
}

#[tokio::test]
async fn ollama_generate_without_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.2:3b",
            "stream": false,
            "options": {"num_predict": 64}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2:3b",
            "response": "Local output",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(config(&server, "").with_max_tokens(64)).unwrap();
    let text = tokio_test::assert_ok!(provider.complete(CompletionRequest::new("Go")).await);
    assert_eq!(text, "Local output");
}

#[tokio::test]
async fn ollama_error_string_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "model 'llama3.2:3b' not found"})))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(config(&server, "")).unwrap();
    let err = provider.complete(CompletionRequest::new("Go")).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn orchestrator_falls_through_real_adapters() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&failing)
        .await;

    let working = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "Rewritten."})))
        .expect(1)
        .mount(&working)
        .await;

    let mut registry = ProviderRegistry::new();
    registry
        .register_arc(Arc::new(GeminiProvider::new(config(&failing, "g-key")).unwrap()))
        .register_arc(Arc::new(OllamaProvider::new(config(&working, "")).unwrap()));

    let orchestrator = Orchestrator::new(registry, WriterlyConfig::default());
    let result = orchestrator
        .generate(
            GenerationRequest::new("u1")
                .with_task(Task::Rewrite)
                .with_context("rough draft"),
        )
        .await
        .unwrap();

    assert_eq!(result.provider, "ollama");
    assert_eq!(result.output, "Rewritten.");
}
