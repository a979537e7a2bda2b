//! HTTP mapping for request failures.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use writerly_core::{RateLimitDecision, SanitizeError, WriterlyError};

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// Input rejected by the sanitizer or tool guard.
    Sanitize(SanitizeError),
    /// The explicitly requested provider is over budget.
    RateLimited {
        provider: String,
        decision: RateLimitDecision,
    },
    /// Malformed request body.
    BadRequest(String),
}

impl From<SanitizeError> for ApiError {
    fn from(err: SanitizeError) -> Self {
        ApiError::Sanitize(err)
    }
}

impl From<WriterlyError> for ApiError {
    fn from(err: WriterlyError) -> Self {
        match err {
            WriterlyError::Sanitize(e) => ApiError::Sanitize(e),
            WriterlyError::RateLimited { provider, decision } => ApiError::RateLimited { provider, decision },
        }
    }
}

/// `X-RateLimit-*` headers, plus `Retry-After` when the request was denied.
pub fn rate_limit_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut put = |name: &'static str, value: u64| {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    };

    put("x-ratelimit-limit", u64::from(decision.limit));
    put("x-ratelimit-remaining", u64::from(decision.remaining));
    put("x-ratelimit-reset", decision.reset_at.div_ceil(1000));
    if !decision.allowed {
        put("retry-after", decision.retry_after_ms.div_ceil(1000));
    }
    headers
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Sanitize(err) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string(), "errorType": err.code() })),
            )
                .into_response(),
            ApiError::RateLimited { provider, decision } => {
                let body = json!({
                    "error": format!("Rate limit exceeded for provider '{}'", provider),
                    "errorType": "RATE_LIMITED",
                    "provider": provider,
                    "retryAfterMs": decision.retry_after_ms,
                });
                (StatusCode::TOO_MANY_REQUESTS, rate_limit_headers(&decision), Json(body)).into_response()
            }
            ApiError::BadRequest(message) => {
                tracing::debug!(error = %message, "Rejected malformed request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": message, "errorType": "BAD_REQUEST" })),
                )
                    .into_response()
            }
        }
    }
}
