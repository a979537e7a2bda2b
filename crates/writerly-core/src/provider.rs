//! Completion provider trait and configuration.
//!
//! Every LLM backend is reduced to one operation: turn a prompt into text.
//! Adapters live in `writerly-ai`; this module holds the contract they
//! implement plus a registry and a scripted mock for tests.

use crate::error::ProviderFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Providers Writerly knows how to construct, in default fallback order.
pub const KNOWN_PROVIDERS: [&str; 4] = ["gemini", "openai", "anthropic", "ollama"];

/// Sampling temperature used when nothing is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Normalize a provider name: lowercase, trimmed, `claude` means `anthropic`.
pub fn canonical_name(name: &str) -> String {
    let lowered = name.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "claude" => "anthropic".to_string(),
        _ => lowered,
    }
}

/// Configuration for one provider adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for authentication. Empty for keyless local backends.
    pub api_key: String,

    /// Model identifier (e.g., "gpt-4o-mini", "gemini-1.5-flash").
    pub model: String,

    /// Base URL for the API.
    pub base_url: Option<String>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,

    /// Temperature for generation (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

impl ProviderConfig {
    /// Create a new provider config with API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 2.0));
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Whether an API key is present.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// A single prompt-to-text call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    /// Provider default when `None`.
    pub max_tokens: Option<u32>,
    /// Ask the backend for a JSON-only response where it supports that.
    pub force_json: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            force_json: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_force_json(mut self, force_json: bool) -> Self {
        self.force_json = force_json;
        self
    }
}

/// Trait that LLM backends implement.
///
/// Implementations must not retry internally; the orchestrator owns
/// fallback. An empty string is a valid return here and is judged by the
/// caller.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Canonical provider name.
    fn name(&self) -> &str;

    /// Send `request` and return the raw completion text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderFailure>;
}

/// Constructed providers by canonical name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn CompletionProvider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider under its own name.
    pub fn register<P: CompletionProvider + 'static>(&mut self, provider: P) -> &mut Self {
        self.register_arc(Arc::new(provider))
    }

    /// Add a shared provider under its own name.
    pub fn register_arc(&mut self, provider: Arc<dyn CompletionProvider>) -> &mut Self {
        self.providers
            .insert(canonical_name(provider.name()), provider);
        self
    }

    /// Add the outcome of constructing a provider.
    ///
    /// Construction failures are logged and the provider is left out.
    pub fn register_result<P: CompletionProvider + 'static>(
        &mut self,
        outcome: Result<P, ProviderFailure>,
    ) -> &mut Self {
        match outcome {
            Ok(provider) => {
                tracing::debug!(provider = provider.name(), "Provider configured");
                self.register(provider)
            }
            Err(failure) => {
                tracing::debug!(provider = failure.provider(), error = %failure, "Provider not configured");
                self
            }
        }
    }

    /// Look up a provider by any accepted spelling of its name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CompletionProvider>> {
        self.providers.get(&canonical_name(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(&canonical_name(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// A scripted provider for tests.
///
/// Queued outcomes are returned first, in order; after that every call gets
/// the standing outcome.
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    queue: Mutex<VecDeque<Result<String, ProviderFailure>>>,
    standing: Result<String, ProviderFailure>,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockProvider {
    /// A mock that answers every call with an empty string.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: canonical_name(&name.into()),
            queue: Mutex::new(VecDeque::new()),
            standing: Ok(String::new()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Answer every unqueued call with `text`.
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.standing = Ok(text.into());
        self
    }

    /// Fail every unqueued call with `failure`.
    pub fn with_failure(mut self, failure: ProviderFailure) -> Self {
        self.standing = Err(failure);
        self
    }

    /// Queue a one-shot outcome ahead of the standing one.
    pub fn then(mut self, outcome: Result<String, ProviderFailure>) -> Self {
        self.queue.get_mut().push_back(outcome);
        self
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request seen.
    pub async fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().await.clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().await = Some(request);

        match self.queue.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => self.standing.clone(),
        }
    }
}
