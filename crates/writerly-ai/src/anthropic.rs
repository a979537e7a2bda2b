//! Anthropic Claude provider implementation.

use crate::http::{build_client, send_json, trim_base};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use writerly_core::{CompletionProvider, CompletionRequest, ProviderConfig, ProviderFailure, WriterlyConfig};

const PROVIDER: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Default `anthropic-version` header.
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

/// Messages API requires `max_tokens`; this is sent when nothing is configured.
pub const DEFAULT_MAX_TOKENS: u32 = 512;

/// Anthropic Claude provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
    endpoint: String,
    api_version: String,
}

/// Anthropic message request.
#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Anthropic message response.
#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// Fails when no API key is set.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderFailure> {
        if !config.has_api_key() {
            return Err(ProviderFailure::Config {
                provider: PROVIDER.to_string(),
                message: "Missing ANTHROPIC_API_KEY".to_string(),
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
            endpoint: format!("{}/v1/messages", base),
            api_version: DEFAULT_API_VERSION.to_string(),
            config,
        })
    }

    /// Override the `anthropic-version` header.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Create a provider from environment variables.
    ///
    /// Reads `ANTHROPIC_API_KEY`, `ANTHROPIC_MODEL`, `ANTHROPIC_BASE_URL`
    /// and `ANTHROPIC_VERSION`.
    pub fn from_env() -> Result<Self, ProviderFailure> {
        let settings = WriterlyConfig::from_env();
        let provider = Self::new(settings.provider_config(PROVIDER).unwrap_or_default())?;
        Ok(match settings.anthropic_version {
            Some(version) => provider.with_api_version(version),
            None => provider,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderFailure> {
        debug!("Sending message to Anthropic");

        let body = MessageRequest {
            model: &self.config.model,
            max_tokens: request
                .max_tokens
                .or(self.config.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response: MessageResponse = send_json(
            PROVIDER,
            self.client
                .post(&self.endpoint)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", &self.api_version)
                .json(&body),
        )
        .await?;

        // Only text blocks contribute; tool-use and other block types are dropped.
        Ok(response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect())
    }
}
