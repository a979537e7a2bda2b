//! Google Gemini provider implementation.

use crate::http::{build_client, send_json, trim_base};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use writerly_core::{CompletionProvider, CompletionRequest, ProviderConfig, ProviderFailure, WriterlyConfig};

const PROVIDER: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Google Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
    base_url: String,
}

// Request structures
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

// Response structures
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ContentResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiResponse {
    /// Text of the first candidate, parts concatenated.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

impl GeminiProvider {
    /// Create a new Gemini provider with the given configuration.
    ///
    /// Fails when no API key is set.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderFailure> {
        if !config.has_api_key() {
            return Err(ProviderFailure::Config {
                provider: PROVIDER.to_string(),
                message: "Missing GEMINI_API_KEY".to_string(),
            });
        }

        let mut config = config;
        if config.model.trim().is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }
        let base_url = trim_base(config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        let client = build_client(PROVIDER, config.timeout_seconds)?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Create a provider from environment variables.
    ///
    /// Reads `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) and optionally `GEMINI_MODEL`.
    pub fn from_env() -> Result<Self, ProviderFailure> {
        let config = WriterlyConfig::from_env()
            .provider_config(PROVIDER)
            .unwrap_or_default();
        Self::new(config)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// generateContent URL.
    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.config.model)
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderFailure> {
        debug!("Sending generateContent to Gemini");

        let body = GeminiRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: &request.prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens.or(self.config.max_tokens),
            },
        };

        let builder = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body);
        let response: GeminiResponse = send_json(PROVIDER, builder).await?;

        Ok(response.text())
    }
}
