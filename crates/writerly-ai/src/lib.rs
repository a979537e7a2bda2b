//! # Writerly AI
//!
//! HTTP provider adapters for the Writerly orchestration core.
//!
//! This crate provides ready-to-use completion backends:
//!
//! - **OpenAI**: Chat Completions
//! - **Anthropic**: Claude Messages API
//! - **Gemini**: Google generateContent
//! - **Ollama**: local models, no API key
//!
//! ## Example
//!
//! ```rust,ignore
//! use writerly_core::{GenerationRequest, Orchestrator, WriterlyConfig};
//!
//! let config = WriterlyConfig::from_env();
//! let registry = writerly_ai::registry_from_config(&config);
//! let orchestrator = Orchestrator::new(registry, config);
//! let result = orchestrator.generate(GenerationRequest::new("anon").with_context("Hi")).await?;
//! ```

pub mod anthropic;
pub mod gemini;
mod http;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Re-export core types for convenience.
pub use writerly_core::{
    CompletionProvider, CompletionRequest, ProviderConfig, ProviderFailure, ProviderRegistry, WriterlyConfig,
};

use tracing::info;

/// Construct every adapter the configuration allows.
///
/// Adapters that fail to construct (usually a missing API key) are logged
/// and left out; Ollama needs no key and is always present.
pub fn registry_from_config(config: &WriterlyConfig) -> ProviderRegistry {
    let settings = |name: &str| config.provider_config(name).unwrap_or_default();

    let anthropic = AnthropicProvider::new(settings("anthropic")).map(|provider| match &config.anthropic_version {
        Some(version) => provider.with_api_version(version.clone()),
        None => provider,
    });

    let mut registry = ProviderRegistry::new();
    registry
        .register_result(GeminiProvider::new(settings("gemini")))
        .register_result(OpenAiProvider::new(settings("openai")))
        .register_result(anthropic)
        .register_result(OllamaProvider::new(settings("ollama")));

    info!(providers = ?registry.names(), "Provider registry ready");
    registry
}

/// Build the registry straight from environment variables.
pub fn registry_from_env() -> ProviderRegistry {
    registry_from_config(&WriterlyConfig::from_env())
}
