//! Error types for Writerly Core.

use crate::ratelimit::RateLimitDecision;
use thiserror::Error;

/// Result type alias for Writerly operations.
pub type Result<T> = std::result::Result<T, WriterlyError>;

/// Main error type surfaced to callers of the orchestration layer.
///
/// Provider failures never appear here directly: the orchestrator recovers
/// from them by moving on to the next candidate.
#[derive(Debug, Error)]
pub enum WriterlyError {
    /// User input was rejected before any provider call.
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    /// The explicitly requested provider has no budget left in this window.
    #[error("Rate limit exceeded for provider '{provider}'. Retry after {} ms", decision.retry_after_ms)]
    RateLimited {
        provider: String,
        decision: RateLimitDecision,
    },
}

/// Why a piece of user text was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("Input must be a string")]
    InvalidType,

    #[error("Input exceeds maximum length of {max} characters")]
    LengthExceeded { max: usize },

    #[error("Input contains invalid UTF-8 encoding")]
    InvalidEncoding,

    #[error("Input appears to contain structured data (JSON/XML/code blocks). Plain text only.")]
    StructuredPayload,

    #[error("Input contains potentially malicious patterns")]
    PromptInjection,

    #[error("Input is empty after sanitization")]
    EmptyAfterSanitization,

    #[error("Tool configuration must be set server-side only. Field '{field}' is not allowed in request.")]
    ToolInjection { field: String },
}

impl SanitizeError {
    /// Stable machine-readable code, returned to clients as `errorType`.
    pub fn code(&self) -> &'static str {
        match self {
            SanitizeError::InvalidType => "INVALID_TYPE",
            SanitizeError::LengthExceeded { .. } => "LENGTH_EXCEEDED",
            SanitizeError::InvalidEncoding => "INVALID_ENCODING",
            SanitizeError::StructuredPayload => "STRUCTURED_PAYLOAD",
            SanitizeError::PromptInjection => "PROMPT_INJECTION",
            SanitizeError::EmptyAfterSanitization => "EMPTY_AFTER_SANITIZATION",
            SanitizeError::ToolInjection { .. } => "TOOL_INJECTION",
        }
    }
}

/// Failure of a single provider adapter call.
#[derive(Debug, Clone, Error)]
pub enum ProviderFailure {
    /// Adapter could not be constructed (missing key, bad client settings).
    #[error("{provider} is not configured: {message}")]
    Config { provider: String, message: String },

    /// The request never produced an HTTP response.
    #[error("{provider} network error: {message}")]
    Network { provider: String, message: String },

    /// Non-2xx response; `message` is the provider's own error text.
    #[error("{provider} API error {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// 2xx response whose body could not be read as expected.
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: String, message: String },
}

impl ProviderFailure {
    /// Name of the provider that failed.
    pub fn provider(&self) -> &str {
        match self {
            ProviderFailure::Config { provider, .. }
            | ProviderFailure::Network { provider, .. }
            | ProviderFailure::Api { provider, .. }
            | ProviderFailure::InvalidResponse { provider, .. } => provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_codes() {
        assert_eq!(SanitizeError::PromptInjection.code(), "PROMPT_INJECTION");
        assert_eq!(
            SanitizeError::LengthExceeded { max: 10 }.code(),
            "LENGTH_EXCEEDED"
        );
        assert_eq!(
            SanitizeError::LengthExceeded { max: 10 }.to_string(),
            "Input exceeds maximum length of 10 characters"
        );
    }

    #[test]
    fn test_provider_failure_message_keeps_provider_text() {
        let err = ProviderFailure::Api {
            provider: "openai".into(),
            status: 401,
            message: "Incorrect API key provided".into(),
        };
        assert_eq!(err.provider(), "openai");
        assert!(err.to_string().contains("Incorrect API key provided"));
    }
}
