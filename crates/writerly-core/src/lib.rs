//! # Writerly Core
//!
//! AI request orchestration for the Writerly writing assistant.
//!
//! This crate sits between client requests and third-party language-model
//! providers. It screens user text, builds one provider-agnostic prompt,
//! walks an ordered provider fallback chain under per-user rate budgets, and
//! normalizes whatever comes back into a single result shape.
//!
//! ## Features
//!
//! - Input sanitization with stable error codes
//! - Deterministic prompt construction with voice settings
//! - Fixed-window rate limiting per (provider, user)
//! - Rolling latency metrics with percentile summaries
//! - Layered JSON extraction for suggestion lists
//!
//! ## Example
//!
//! ```rust,ignore
//! use writerly_core::{GenerationRequest, Orchestrator, Task, WriterlyConfig};
//!
//! let config = WriterlyConfig::from_env();
//! let orchestrator = Orchestrator::new(writerly_ai::registry_from_config(&config), config);
//!
//! let result = orchestrator
//!     .generate(GenerationRequest::new("anon").with_task(Task::Rewrite).with_context(text))
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod generation;
pub mod metrics;
pub mod observer;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod ratelimit;
pub mod sanitize;
pub mod voice;

pub use config::WriterlyConfig;
pub use error::{ProviderFailure, Result, SanitizeError, WriterlyError};
pub use extract::{extract_suggestions, Extraction, ExtractionLayer};
pub use generation::{GenerationRequest, GenerationResult, Suggestion, SuggestionCategory, Task};
pub use metrics::{MetricSummary, MetricsRecorder};
pub use observer::{ObserverPtr, OrchestratorObserver};
pub use orchestrator::{Orchestrator, ProviderCandidate};
pub use prompt::{build_prompt, PromptSpec};
pub use provider::{
    canonical_name, CompletionProvider, CompletionRequest, MockProvider, ProviderConfig, ProviderRegistry,
};
pub use ratelimit::{ProviderLimits, RateLimitDecision, RateLimiter};
pub use sanitize::{validate_no_tool_injection, Sanitizer};
pub use voice::VoiceSettings;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        CompletionProvider, CompletionRequest, GenerationRequest, GenerationResult, Orchestrator,
        ProviderConfig, ProviderFailure, ProviderRegistry, Result, Task, VoiceSettings, WriterlyConfig,
        WriterlyError,
    };
}
