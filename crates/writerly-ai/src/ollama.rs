//! Ollama local provider implementation.
//!
//! Supports local LLM models through Ollama.

use crate::http::{build_client, send_json, trim_base};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use writerly_core::{CompletionProvider, CompletionRequest, ProviderConfig, ProviderFailure, WriterlyConfig};

const PROVIDER: &str = "ollama";

/// Server address used when `OLLAMA_URL` is unset.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.2:3b";

/// Ollama provider for local generation. Needs no API key.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    model: String,
    endpoint: String,
    max_tokens: Option<u32>,
}

/// Ollama generate request.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama generate response.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

impl OllamaProvider {
    /// Create a new Ollama provider. Missing model and URL fall back to defaults.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderFailure> {
        let model = match config.model.trim() {
            "" => DEFAULT_MODEL.to_string(),
            model => model.to_string(),
        };
        let base = trim_base(config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL));
        let client = build_client(PROVIDER, config.timeout_seconds)?;

        Ok(Self {
            client,
            model,
            endpoint: format!("{}/api/generate", base),
            max_tokens: config.max_tokens,
        })
    }

    /// Create from environment variables.
    ///
    /// Reads `OLLAMA_MODEL` and optionally `OLLAMA_URL`.
    pub fn from_env() -> Result<Self, ProviderFailure> {
        let config = WriterlyConfig::from_env()
            .provider_config(PROVIDER)
            .unwrap_or_default();
        Self::new(config)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderFailure> {
        debug!("Sending generate request to Ollama");

        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens.or(self.max_tokens),
            },
        };

        let response: GenerateResponse =
            send_json(PROVIDER, self.client.post(&self.endpoint).json(&body)).await?;

        Ok(response.response.unwrap_or_default())
    }
}
