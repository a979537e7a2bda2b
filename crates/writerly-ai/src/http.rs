//! HTTP plumbing shared by every adapter.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use writerly_core::ProviderFailure;

/// Timeout applied when the config does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Build a client with the configured timeout.
pub(crate) fn build_client(provider: &str, timeout_seconds: Option<u64>) -> Result<Client, ProviderFailure> {
    let timeout = timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .map_err(|e| ProviderFailure::Config {
            provider: provider.to_string(),
            message: e.without_url().to_string(),
        })
}

/// Base URL without trailing slashes.
pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Send a request and decode a 2xx JSON body into `T`.
///
/// Non-2xx responses become [`ProviderFailure::Api`] carrying the provider's
/// own error message when the body has one. Transport errors never carry the
/// request URL.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, ProviderFailure> {
    let response = request.send().await.map_err(|e| network_failure(provider, e))?;

    let status = response.status();
    let body = response.text().await.map_err(|e| network_failure(provider, e))?;

    if !status.is_success() {
        return Err(ProviderFailure::Api {
            provider: provider.to_string(),
            status: status.as_u16(),
            message: error_message(provider, &body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderFailure::InvalidResponse {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

fn network_failure(provider: &str, err: reqwest::Error) -> ProviderFailure {
    ProviderFailure::Network {
        provider: provider.to_string(),
        message: err.without_url().to_string(),
    }
}

/// Pull a human-readable message out of an error body.
///
/// Handles `{"error": {"message": ...}}` and `{"error": "..."}`, then falls
/// back to the raw body.
pub(crate) fn error_message(provider: &str, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        let error = v.get("error")?;
        error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
    });

    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => format!("{} request failed", provider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message("openai", r#"{"error":{"message":"Invalid key","type":"auth"}}"#),
            "Invalid key"
        );
        assert_eq!(error_message("ollama", r#"{"error":"model not found"}"#), "model not found");
        assert_eq!(error_message("gemini", "Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message("anthropic", ""), "anthropic request failed");
    }

    #[test]
    fn test_trim_base() {
        assert_eq!(trim_base("http://localhost:11434//"), "http://localhost:11434");
    }
}
