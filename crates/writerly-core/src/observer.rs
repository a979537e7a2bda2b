use crate::generation::{GenerationRequest, GenerationResult};
use crate::ratelimit::RateLimitDecision;
use std::sync::Arc;
use std::time::Duration;

/// Trait for observing orchestrator events (logging, metrics, UI).
///
/// Every method has a no-op default so observers only implement what they
/// care about.
pub trait OrchestratorObserver: Send + Sync {
    /// Called once per request, before any candidate is tried.
    fn on_start(&self, _request_id: &str, _request: &GenerationRequest) {}

    /// Called before a candidate is rate-checked.
    fn on_attempt(&self, _request_id: &str, _provider: &str) {}

    /// Called when a candidate is over budget.
    fn on_rate_limited(&self, _request_id: &str, _provider: &str, _decision: &RateLimitDecision) {}

    /// Called when the request ends in a rate-limit error because the
    /// explicitly requested provider is over budget.
    fn on_rejected(&self, _request_id: &str, _provider: &str, _decision: &RateLimitDecision) {}

    /// Called when a provider call fails or yields unusable output.
    fn on_provider_failure(&self, _request_id: &str, _provider: &str, _error: &str) {}

    /// Called once a provider produced a usable result.
    fn on_success(&self, _request_id: &str, _result: &GenerationResult, _elapsed: Duration) {}

    /// Called when every candidate failed and the fallback is returned.
    fn on_exhausted(&self, _request_id: &str, _last_error: &str) {}
}

pub type ObserverPtr = Arc<dyn OrchestratorObserver>;

