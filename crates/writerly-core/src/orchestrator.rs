//! Orchestrator - turns a generation request into one normalized result.
//!
//! The flow for every request is fixed: build the prompt, derive the ordered
//! candidate list, then for each candidate check its rate budget, call it and
//! shape the output. The first usable output wins. When nothing is usable the
//! caller still gets a successful, clearly marked fallback result.

use crate::config::WriterlyConfig;
use crate::error::{Result, SanitizeError, WriterlyError};
use crate::extract::extract_suggestions;
use crate::generation::{GenerationRequest, GenerationResult, Suggestion, Task, FALLBACK_PROVIDER};
use crate::metrics::{provider_channel, MetricsRecorder, AI_CHANNEL, FALLBACK_CHANNEL};
use crate::observer::ObserverPtr;
use crate::prompt::{build_prompt, PromptSpec};
use crate::provider::{canonical_name, CompletionProvider, CompletionRequest, ProviderRegistry};
use crate::ratelimit::RateLimiter;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Prefix of the soft-failure output; the caller's request text follows.
pub const FALLBACK_NOTICE: &str =
    "Sorry, I couldn't reach the AI provider. Here's a lightly formatted version of your request:\n\n";

/// Error reported when no candidate could be tried at all.
pub const NO_PROVIDERS_ERROR: &str = "no AI providers are configured";

/// A provider selected for one request.
#[derive(Clone)]
pub struct ProviderCandidate {
    pub name: String,
    pub adapter: Arc<dyn CompletionProvider>,
}

impl fmt::Debug for ProviderCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCandidate")
            .field("name", &self.name)
            .finish()
    }
}

/// Usable output from one provider call.
struct Shaped {
    output: String,
    suggestions: Option<Vec<Suggestion>>,
}

/// The main entry point for AI generation.
///
/// # Example
///
/// ```rust,ignore
/// use writerly_core::{GenerationRequest, Orchestrator, Task, WriterlyConfig};
///
/// let config = WriterlyConfig::from_env();
/// let registry = writerly_ai::registry_from_config(&config);
/// let orchestrator = Orchestrator::new(registry, config);
///
/// let request = GenerationRequest::new("user-1")
///     .with_task(Task::Summarize)
///     .with_context("Long text...");
///
/// let result = orchestrator.generate(request).await?;
/// ```
pub struct Orchestrator {
    registry: ProviderRegistry,
    config: WriterlyConfig,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsRecorder>,
    observer: Option<ObserverPtr>,
    next_request: AtomicU64,
}

impl Orchestrator {
    /// Create an orchestrator with its own limiter and metrics store.
    pub fn new(registry: ProviderRegistry, config: WriterlyConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limits.clone()));
        Self {
            registry,
            config,
            limiter,
            metrics: Arc::new(MetricsRecorder::new()),
            observer: None,
            next_request: AtomicU64::new(1),
        }
    }

    /// Share an existing rate limiter.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Share an existing metrics store.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: ObserverPtr) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &WriterlyConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Ordered, de-duplicated candidates for a request.
    ///
    /// Explicit override first, then the preferred provider, then the
    /// fallback order. Names without a constructed adapter are dropped.
    pub fn candidates(&self, explicit: Option<&str>) -> Vec<ProviderCandidate> {
        let wanted = explicit
            .into_iter()
            .chain(self.config.preferred_provider.as_deref())
            .chain(self.config.fallback_order.iter().map(String::as_str))
            .map(canonical_name)
            .filter(|name| !name.is_empty());

        let mut seen: Vec<String> = Vec::new();
        let mut candidates = Vec::new();
        for name in wanted {
            if seen.contains(&name) {
                continue;
            }
            seen.push(name.clone());
            if let Some(adapter) = self.registry.get(&name) {
                candidates.push(ProviderCandidate { name, adapter });
            }
        }
        candidates
    }

    /// Run one generation request through the candidate chain.
    ///
    /// Only over-long input and a rate-limited explicit provider produce an
    /// `Err`; every other failure ends in a fallback result. Text is passed
    /// on verbatim so suggestion offsets stay valid.
    #[instrument(skip(self, request), fields(task = %request.task, user = %request.user_id))]
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        let max = self.config.max_input_length;
        if request.instruction.chars().count() > max || request.context.chars().count() > max {
            return Err(SanitizeError::LengthExceeded { max }.into());
        }

        let request_id = format!("gen-{}", self.next_request.fetch_add(1, Ordering::Relaxed));
        let started = Instant::now();
        if let Some(observer) = &self.observer {
            observer.on_start(&request_id, &request);
        }

        let prompt = build_prompt(&PromptSpec {
            task: request.task,
            instruction: &request.instruction,
            context: &request.context,
            settings: &request.voice_settings,
        });
        let completion = CompletionRequest::new(prompt)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_force_json(request.task == Task::Suggestions);

        let explicit = request
            .explicit_provider
            .as_deref()
            .map(canonical_name)
            .filter(|name| !name.is_empty());
        let candidates = self.candidates(explicit.as_deref());
        debug!(
            request_id = %request_id,
            candidates = ?candidates.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Selected providers"
        );

        let mut last_error: Option<String> = None;

        for candidate in candidates {
            let name = candidate.name.as_str();
            if let Some(observer) = &self.observer {
                observer.on_attempt(&request_id, name);
            }

            let decision = self.limiter.consume_provider(&request.user_id, name);
            if !decision.allowed {
                if let Some(observer) = &self.observer {
                    observer.on_rate_limited(&request_id, name, &decision);
                }
                if explicit.as_deref() == Some(name) {
                    warn!(provider = name, retry_after_ms = decision.retry_after_ms, "Explicit provider rate limited");
                    if let Some(observer) = &self.observer {
                        observer.on_rejected(&request_id, name, &decision);
                    }
                    return Err(WriterlyError::RateLimited {
                        provider: name.to_string(),
                        decision,
                    });
                }
                warn!(provider = name, retry_after_ms = decision.retry_after_ms, "Skipping rate-limited provider");
                last_error = Some(format!("Rate limit exceeded for provider '{}'", name));
                continue;
            }

            let call_started = Instant::now();
            let failure = match candidate.adapter.complete(completion.clone()).await {
                Ok(raw) => {
                    let elapsed = call_started.elapsed();
                    self.metrics.record_duration(AI_CHANNEL, elapsed);
                    self.metrics.record_duration(&provider_channel(name), elapsed);

                    match shape(request.task, &raw) {
                        Some(shaped) => {
                            info!(provider = name, duration_ms = elapsed.as_millis() as u64, "Generation succeeded");

                            let result = GenerationResult {
                                output: shaped.output,
                                provider: name.to_string(),
                                suggestions: shaped.suggestions,
                                duration_ms: Some(elapsed.as_millis() as u64),
                                error: None,
                            };
                            if let Some(observer) = &self.observer {
                                observer.on_success(&request_id, &result, elapsed);
                            }
                            return Ok(result);
                        }
                        None => format!("{} returned an empty response", name),
                    }
                }
                Err(failure) => failure.to_string(),
            };

            warn!(provider = name, error = %failure, "Provider attempt failed");
            if let Some(observer) = &self.observer {
                observer.on_provider_failure(&request_id, name, &failure);
            }
            last_error = Some(failure);
        }

        let error = last_error.unwrap_or_else(|| NO_PROVIDERS_ERROR.to_string());
        self.metrics.record_duration(FALLBACK_CHANNEL, started.elapsed());
        warn!(request_id = %request_id, error = %error, "All providers failed, returning fallback");
        if let Some(observer) = &self.observer {
            observer.on_exhausted(&request_id, &error);
        }

        Ok(fallback_result(&request, error))
    }
}

/// Judge raw provider text; `None` means the attempt counts as failed.
fn shape(task: Task, raw: &str) -> Option<Shaped> {
    let text = raw.trim();

    if task != Task::Suggestions {
        return (!text.is_empty()).then(|| Shaped {
            output: text.to_string(),
            suggestions: None,
        });
    }

    let suggestions = extract_suggestions(raw)
        .map(|extraction| {
            debug!(layer = ?extraction.layer, count = extraction.suggestions.len(), "Parsed suggestions");
            extraction.suggestions
        })
        .unwrap_or_default();

    if suggestions.is_empty() && text.is_empty() {
        return None;
    }
    Some(Shaped {
        output: text.to_string(),
        suggestions: Some(suggestions),
    })
}

fn fallback_result(request: &GenerationRequest, error: String) -> GenerationResult {
    let echo = if request.instruction.trim().is_empty() {
        request.context.as_str()
    } else {
        request.instruction.as_str()
    };

    GenerationResult {
        output: format!("{}{}", FALLBACK_NOTICE, echo),
        provider: FALLBACK_PROVIDER.to_string(),
        suggestions: (request.task == Task::Suggestions).then(Vec::new),
        duration_ms: None,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderFailure;
    use crate::generation::SuggestionCategory;
    use crate::observer::OrchestratorObserver;
    use crate::provider::MockProvider;
    use crate::ratelimit::{ProviderLimits, RateLimitDecision};
    use std::sync::Mutex;
    use std::time::Duration;

    const SUGGESTIONS_JSON: &str = r#"{"suggestions":[{"message":"Repeated word","original":"the the","suggestion":"the","from":4,"to":11,"category":"Correctness"}]}"#;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl OrchestratorObserver for RecordingObserver {
        fn on_attempt(&self, _id: &str, provider: &str) {
            self.push(format!("attempt:{}", provider));
        }

        fn on_rate_limited(&self, _id: &str, provider: &str, _decision: &RateLimitDecision) {
            self.push(format!("limited:{}", provider));
        }

        fn on_rejected(&self, _id: &str, provider: &str, _decision: &RateLimitDecision) {
            self.push(format!("rejected:{}", provider));
        }

        fn on_provider_failure(&self, _id: &str, provider: &str, _error: &str) {
            self.push(format!("failed:{}", provider));
        }

        fn on_success(&self, _id: &str, result: &GenerationResult, _elapsed: Duration) {
            self.push(format!("success:{}", result.provider));
        }

        fn on_exhausted(&self, _id: &str, _last_error: &str) {
            self.push("exhausted".to_string());
        }
    }

    fn registry(providers: &[Arc<MockProvider>]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register_arc(provider.clone());
        }
        registry
    }

    fn failure(provider: &str) -> ProviderFailure {
        ProviderFailure::Api {
            provider: provider.into(),
            status: 500,
            message: "upstream exploded".into(),
        }
    }

    #[test]
    fn test_explicit_first_without_duplicates() {
        let mocks: Vec<_> = ["gemini", "openai", "anthropic", "ollama"]
            .into_iter()
            .map(|n| Arc::new(MockProvider::new(n)))
            .collect();
        let config = WriterlyConfig::default().with_preferred_provider("openai");
        let orchestrator = Orchestrator::new(registry(&mocks), config);

        let names = |explicit| {
            orchestrator
                .candidates(explicit)
                .into_iter()
                .map(|c| c.name)
                .collect::<Vec<_>>()
        };

        assert_eq!(names(Some("Claude")), vec!["anthropic", "openai", "gemini", "ollama"]);
        assert_eq!(names(Some("openai")), vec!["openai", "gemini", "anthropic", "ollama"]);
        assert_eq!(names(None), vec!["openai", "gemini", "anthropic", "ollama"]);
        // Unconfigured explicit names are dropped, not fatal.
        assert_eq!(names(Some("mistral")), vec!["openai", "gemini", "anthropic", "ollama"]);
    }

    #[tokio::test]
    async fn test_explicit_rate_limited_fails_fast() {
        let anthropic = Arc::new(MockProvider::new("anthropic").with_response("ok"));
        let gemini = Arc::new(MockProvider::new("gemini").with_response("ok"));
        let config = WriterlyConfig::default()
            .with_rate_limits(ProviderLimits::default().with_limit("anthropic", 1));
        let observer = Arc::new(RecordingObserver::default());
        let orchestrator = Orchestrator::new(registry(&[anthropic.clone(), gemini.clone()]), config)
            .with_observer(observer.clone());

        let request = GenerationRequest::new("u1")
            .with_instruction("Hi")
            .with_provider("anthropic");
        let first = orchestrator.generate(request.clone()).await.unwrap();
        assert_eq!(first.provider, "anthropic");

        let err = orchestrator.generate(request).await.unwrap_err();
        match err {
            WriterlyError::RateLimited { provider, decision } => {
                assert_eq!(provider, "anthropic");
                assert!(decision.retry_after_ms > 0);
                assert_eq!(decision.remaining, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(anthropic.calls(), 1);
        assert_eq!(gemini.calls(), 0);

        let events = observer.events();
        assert_eq!(&events[events.len() - 2..], ["limited:anthropic", "rejected:anthropic"]);
    }

    #[tokio::test]
    async fn test_overlong_input_is_rejected_before_any_call() {
        let gemini = Arc::new(MockProvider::new("gemini").with_response("ok"));
        let config = WriterlyConfig::default().with_max_input_length(5);
        let orchestrator = Orchestrator::new(registry(&[gemini.clone()]), config);

        let err = orchestrator
            .generate(GenerationRequest::new("u1").with_context("123456"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WriterlyError::Sanitize(SanitizeError::LengthExceeded { max: 5 })
        ));
        assert_eq!(gemini.calls(), 0);

        // Characters, not bytes.
        let result = orchestrator
            .generate(GenerationRequest::new("u1").with_context("héllo"))
            .await
            .unwrap();
        assert_eq!(result.provider, "gemini");
    }

    #[tokio::test]
    async fn test_third_provider_wins_after_two_failures() {
        let gemini = Arc::new(MockProvider::new("gemini").with_failure(failure("gemini")));
        let openai = Arc::new(MockProvider::new("openai").with_response("   "));
        let anthropic = Arc::new(MockProvider::new("anthropic").with_response("Polished text."));
        let observer = Arc::new(RecordingObserver::default());

        let orchestrator = Orchestrator::new(
            registry(&[gemini.clone(), openai.clone(), anthropic.clone()]),
            WriterlyConfig::default(),
        )
        .with_observer(observer.clone());

        let result = orchestrator
            .generate(GenerationRequest::new("u1").with_context("rough text"))
            .await
            .unwrap();

        assert_eq!(result.provider, "anthropic");
        assert_eq!(result.output, "Polished text.");
        assert!(result.duration_ms.is_some());
        assert!(result.error.is_none());

        let metrics = orchestrator.metrics();
        // Blank answers still count as a response; transport failures do not.
        assert_eq!(metrics.summary(AI_CHANNEL).unwrap().count, 2);
        assert_eq!(metrics.summary("ai:anthropic").unwrap().count, 1);
        assert_eq!(metrics.summary("ai:openai").unwrap().count, 1);
        assert!(metrics.summary("ai:gemini").is_none());
        assert!(metrics.summary(FALLBACK_CHANNEL).is_none());

        assert_eq!(
            observer.events(),
            vec![
                "attempt:gemini",
                "failed:gemini",
                "attempt:openai",
                "failed:openai",
                "attempt:anthropic",
                "success:anthropic",
            ]
        );
        assert_eq!((gemini.calls(), openai.calls(), anthropic.calls()), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_fenced_suggestions_parse_like_raw() {
        let raw = Arc::new(MockProvider::new("gemini").with_response(SUGGESTIONS_JSON));
        let fenced = Arc::new(
            MockProvider::new("openai").with_response(format!("```json\n{}\n```", SUGGESTIONS_JSON)),
        );

        let request = GenerationRequest::new("u1")
            .with_task(Task::Suggestions)
            .with_context("Fix the the cat.");

        let from_raw = Orchestrator::new(registry(&[raw.clone()]), WriterlyConfig::default())
            .generate(request.clone())
            .await
            .unwrap();
        let from_fenced = Orchestrator::new(registry(&[fenced]), WriterlyConfig::default())
            .generate(request)
            .await
            .unwrap();

        let suggestions = from_raw.suggestions.unwrap();
        assert_eq!(suggestions, from_fenced.suggestions.unwrap());
        assert_eq!(suggestions[0].category, SuggestionCategory::Correctness);
        assert_eq!(suggestions[0].from, Some(4));

        let sent = raw.last_request().await.unwrap();
        assert!(sent.force_json);
        assert!(sent.prompt.contains("<user_text>\nFix the the cat.\n</user_text>"));
    }

    #[tokio::test]
    async fn test_suggestions_prose_without_json_is_success() {
        let gemini = Arc::new(MockProvider::new("gemini").with_response("Looks fine to me."));
        let orchestrator = Orchestrator::new(registry(&[gemini]), WriterlyConfig::default());

        let result = orchestrator
            .generate(GenerationRequest::new("u1").with_task(Task::Suggestions).with_context("x"))
            .await
            .unwrap();

        assert_eq!(result.provider, "gemini");
        assert_eq!(result.suggestions, Some(vec![]));
    }

    #[tokio::test]
    async fn test_all_fail_returns_fallback() {
        let gemini = Arc::new(MockProvider::new("gemini").with_failure(failure("gemini")));
        let ollama = Arc::new(MockProvider::new("ollama").with_failure(failure("ollama")));
        let observer = Arc::new(RecordingObserver::default());
        let orchestrator = Orchestrator::new(registry(&[gemini, ollama]), WriterlyConfig::default())
            .with_observer(observer.clone());

        let result = orchestrator
            .generate(GenerationRequest::new("u1").with_instruction("Draft a thank-you note"))
            .await
            .unwrap();

        assert!(result.is_fallback());
        assert_eq!(result.provider, "fallback");
        assert!(result.output.starts_with(FALLBACK_NOTICE));
        assert!(result.output.ends_with("Draft a thank-you note"));
        assert!(result.error.unwrap().contains("ollama"));
        assert_eq!(orchestrator.metrics().summary(FALLBACK_CHANNEL).unwrap().count, 1);
        assert_eq!(orchestrator.metrics().summary(AI_CHANNEL).unwrap().count, 0);
        assert_eq!(observer.events().last().map(String::as_str), Some("exhausted"));
    }

    #[tokio::test]
    async fn test_no_providers_configured() {
        let orchestrator = Orchestrator::new(ProviderRegistry::new(), WriterlyConfig::default());
        let result = orchestrator
            .generate(GenerationRequest::new("u1").with_context("Only context here"))
            .await
            .unwrap();

        assert!(result.is_fallback());
        assert!(result.output.ends_with("Only context here"));
        assert_eq!(result.error.as_deref(), Some(NO_PROVIDERS_ERROR));
    }

    #[tokio::test]
    async fn test_limited_fallback_candidate_is_skipped() {
        let gemini = Arc::new(MockProvider::new("gemini").with_response("from gemini"));
        let openai = Arc::new(MockProvider::new("openai").with_response("from openai"));
        let observer = Arc::new(RecordingObserver::default());
        let config = WriterlyConfig::default()
            .with_rate_limits(ProviderLimits::default().with_limit("gemini", 0));
        let orchestrator = Orchestrator::new(registry(&[gemini.clone(), openai]), config)
            .with_observer(observer.clone());

        let result = orchestrator.generate(GenerationRequest::new("u1").with_instruction("Hi")).await;
        let result = tokio_test::assert_ok!(result);

        assert_eq!(result.provider, "openai");
        assert_eq!(gemini.calls(), 0);
        assert_eq!(observer.events()[1], "limited:gemini");
    }

    #[tokio::test]
    async fn test_completion_options_follow_config() {
        let gemini = Arc::new(MockProvider::new("gemini").with_response("done"));
        let config = WriterlyConfig::default()
            .with_temperature(0.2)
            .with_max_tokens(Some(128));
        let orchestrator = Orchestrator::new(registry(&[gemini.clone()]), config);

        orchestrator
            .generate(GenerationRequest::new("u1").with_task(Task::Summarize).with_context("text"))
            .await
            .unwrap();

        let sent = gemini.last_request().await.unwrap();
        assert_eq!(sent.temperature, 0.2);
        assert_eq!(sent.max_tokens, Some(128));
        assert!(!sent.force_json);
    }
}
