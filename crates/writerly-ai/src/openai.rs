//! OpenAI provider implementation.
//!
//! Uses the Chat Completions API with a single user message.

use crate::http::{build_client, send_json, trim_base};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use writerly_core::{CompletionProvider, CompletionRequest, ProviderConfig, ProviderFailure, WriterlyConfig};

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI chat completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
    endpoint: String,
}

/// OpenAI chat completion request.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// OpenAI chat completion response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider with the given configuration.
    ///
    /// Fails when no API key is set.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderFailure> {
        if !config.has_api_key() {
            return Err(ProviderFailure::Config {
                provider: PROVIDER.to_string(),
                message: "Missing OPENAI_API_KEY".to_string(),
            });
        }

        let mut config = config;
        if config.model.trim().is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }
        let base = trim_base(config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        let client = build_client(PROVIDER, config.timeout_seconds)?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", base),
            config,
        })
    }

    /// Create a provider from environment variables.
    ///
    /// Reads `OPENAI_API_KEY` and optionally `OPENAI_MODEL` / `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, ProviderFailure> {
        let config = WriterlyConfig::from_env()
            .provider_config(PROVIDER)
            .unwrap_or_default();
        Self::new(config)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, request), fields(model = %self.config.model, force_json = request.force_json))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderFailure> {
        debug!("Sending chat completion to OpenAI");

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            response_format: request
                .force_json
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let response: ChatResponse = send_json(
            PROVIDER,
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.config.api_key)
                .json(&body),
        )
        .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_fails_fast() {
        let err = OpenAiProvider::new(ProviderConfig::new("", "")).unwrap_err();
        assert!(matches!(err, ProviderFailure::Config { .. }));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_defaults_applied() {
        let provider = OpenAiProvider::new(
            ProviderConfig::new("sk-test", "").with_base_url("http://localhost:8080/"),
        )
        .unwrap();
        assert_eq!(provider.model(), DEFAULT_MODEL);
        assert_eq!(provider.endpoint, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: 0.5,
            max_tokens: None,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert!(json.get("max_tokens").is_none());
    }
}
