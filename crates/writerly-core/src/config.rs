//! # Writerly Configuration
//!
//! Central configuration for the orchestration layer and its providers.
//! Supports loading from environment variables and programmatic defaults.

use crate::provider::{canonical_name, ProviderConfig, DEFAULT_TEMPERATURE, KNOWN_PROVIDERS};
use crate::ratelimit::ProviderLimits;
use crate::sanitize::DEFAULT_MAX_LENGTH;
use std::env;
use std::str::FromStr;

/// Global configuration for Writerly.
///
/// # Example
/// ```rust
/// use writerly_core::WriterlyConfig;
///
/// // Load from environment
/// let config = WriterlyConfig::from_env();
///
/// // Or customize
/// let config = WriterlyConfig::default()
///     .with_preferred_provider("openai")
///     .with_temperature(0.2);
/// assert_eq!(config.preferred_provider.as_deref(), Some("openai"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WriterlyConfig {
    /// Provider tried right after an explicit request override.
    /// Env: LLM_PROVIDER
    pub preferred_provider: Option<String>,

    /// Order in which the remaining providers are tried.
    /// Default: gemini, openai, anthropic, ollama. Env: LLM_FALLBACK_ORDER
    pub fallback_order: Vec<String>,

    /// Requests per minute per (provider, user).
    /// Env: OPENAI_RPM, GEMINI_RPM, ANTHROPIC_RPM, OLLAMA_RPM, DEFAULT_LLM_RPM
    pub rate_limits: ProviderLimits,

    /// Longest accepted user text, in characters.
    /// Default: 10000, Env: AI_MAX_INPUT_LENGTH
    pub max_input_length: usize,

    /// Default: 0.7, Env: AI_TEMPERATURE
    pub temperature: f32,

    /// Provider default when unset. Env: AI_MAX_TOKENS
    pub max_tokens: Option<u32>,

    /// Per-call HTTP timeout.
    /// Default: 60, Env: AI_TIMEOUT_SECS
    pub request_timeout_secs: u64,

    /// HTTP listen port.
    /// Default: 3001, Env: PORT
    pub port: u16,

    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
    pub gemini: ProviderConfig,
    pub ollama: ProviderConfig,

    /// Value of the `anthropic-version` header. Env: ANTHROPIC_VERSION
    pub anthropic_version: Option<String>,
}

impl Default for WriterlyConfig {
    fn default() -> Self {
        Self {
            preferred_provider: None,
            fallback_order: KNOWN_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            rate_limits: ProviderLimits::default(),
            max_input_length: DEFAULT_MAX_LENGTH,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            request_timeout_secs: 60,
            port: 3001,
            openai: ProviderConfig::default(),
            anthropic: ProviderConfig::default(),
            gemini: ProviderConfig::default(),
            ollama: ProviderConfig::default(),
            anthropic_version: None,
        }
    }
}

impl WriterlyConfig {
    /// Create a new config from environment variables.
    /// Falls back to defaults for missing or unparsable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create a config from an arbitrary key lookup.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(v) = get("LLM_PROVIDER") {
            config.preferred_provider = Some(canonical_name(&v));
        }
        if let Some(v) = get("LLM_FALLBACK_ORDER") {
            let order: Vec<String> = v
                .split(',')
                .map(canonical_name)
                .filter(|name| !name.is_empty())
                .collect();
            if !order.is_empty() {
                config.fallback_order = order;
            }
        }

        let mut limits = ProviderLimits::default();
        if let Some(n) = parse_var(&get, "DEFAULT_LLM_RPM").filter(|&n: &u32| n > 0) {
            limits = limits.with_default(n);
        }
        for provider in KNOWN_PROVIDERS {
            let key = format!("{}_RPM", provider.to_ascii_uppercase());
            if let Some(n) = parse_var(&get, &key).filter(|&n: &u32| n > 0) {
                limits = limits.with_limit(provider, n);
            }
        }
        config.rate_limits = limits;

        if let Some(n) = parse_var(&get, "AI_MAX_INPUT_LENGTH").filter(|&n: &usize| n > 0) {
            config.max_input_length = n;
        }
        if let Some(t) = parse_var(&get, "AI_TEMPERATURE") {
            config = config.with_temperature(t);
        }
        if let Some(n) = parse_var(&get, "AI_MAX_TOKENS").filter(|&n: &u32| n > 0) {
            config.max_tokens = Some(n);
        }
        if let Some(n) = parse_var(&get, "AI_TIMEOUT_SECS").filter(|&n: &u64| n > 0) {
            config.request_timeout_secs = n;
        }
        if let Some(n) = parse_var(&get, "PORT") {
            config.port = n;
        }

        let provider = |key: Option<String>, model: &str, url: &str| {
            let mut provider = ProviderConfig::new(key.unwrap_or_default(), get(model).unwrap_or_default());
            if let Some(url) = get(url) {
                provider = provider.with_base_url(url);
            }
            provider
        };
        config.openai = provider(get("OPENAI_API_KEY"), "OPENAI_MODEL", "OPENAI_BASE_URL");
        config.anthropic = provider(get("ANTHROPIC_API_KEY"), "ANTHROPIC_MODEL", "ANTHROPIC_BASE_URL");
        config.gemini = provider(
            get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            "GEMINI_MODEL",
            "GEMINI_BASE_URL",
        );
        config.ollama = provider(None, "OLLAMA_MODEL", "OLLAMA_URL");
        config.anthropic_version = get("ANTHROPIC_VERSION");

        config
    }

    /// Builder: Set the preferred provider.
    pub fn with_preferred_provider(mut self, provider: impl AsRef<str>) -> Self {
        self.preferred_provider = Some(canonical_name(provider.as_ref()));
        self
    }

    /// Builder: Set the fallback order.
    pub fn with_fallback_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fallback_order = order.into_iter().map(|p| canonical_name(p.as_ref())).collect();
        self
    }

    /// Builder: Set rate limits.
    pub fn with_rate_limits(mut self, limits: ProviderLimits) -> Self {
        self.rate_limits = limits;
        self
    }

    /// Builder: Set the maximum input length.
    pub fn with_max_input_length(mut self, max: usize) -> Self {
        self.max_input_length = max;
        self
    }

    /// Builder: Set the sampling temperature (clamped to 0.0 - 2.0).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Builder: Set the max token budget.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Builder: Set the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Adapter settings for `provider`, with the shared timeout applied.
    pub fn provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        let config = match canonical_name(provider).as_str() {
            "openai" => &self.openai,
            "anthropic" => &self.anthropic,
            "gemini" => &self.gemini,
            "ollama" => &self.ollama,
            _ => return None,
        };
        let mut config = config.clone().with_timeout(self.request_timeout_secs);
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        Some(config)
    }

    /// Requests per minute for `provider`.
    pub fn rpm_for(&self, provider: &str) -> u32 {
        self.rate_limits.limit_for(provider)
    }
}

fn parse_var<T: FromStr>(get: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::DEFAULT_RPM;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = WriterlyConfig::default();
        assert_eq!(config.preferred_provider, None);
        assert_eq!(config.fallback_order, vec!["gemini", "openai", "anthropic", "ollama"]);
        assert_eq!(config.max_input_length, 10_000);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.port, 3001);
        assert_eq!(config.rpm_for("openai"), DEFAULT_RPM);
    }

    #[test]
    fn test_from_lookup() {
        let config = WriterlyConfig::from_lookup(lookup(&[
            ("LLM_PROVIDER", "Claude"),
            ("LLM_FALLBACK_ORDER", "ollama, openai,,"),
            ("OPENAI_RPM", "5"),
            ("GEMINI_RPM", "0"),
            ("DEFAULT_LLM_RPM", "30"),
            ("AI_TEMPERATURE", "9"),
            ("AI_MAX_TOKENS", "400"),
            ("PORT", "not-a-port"),
            ("GOOGLE_API_KEY", "g-key"),
            ("OPENAI_API_KEY", "  "),
            ("OLLAMA_URL", "http://gpu-box:11434"),
            ("ANTHROPIC_VERSION", "2023-06-01"),
        ]));

        assert_eq!(config.preferred_provider.as_deref(), Some("anthropic"));
        assert_eq!(config.fallback_order, vec!["ollama", "openai"]);
        assert_eq!(config.rpm_for("openai"), 5);
        assert_eq!(config.rpm_for("gemini"), 60);
        assert_eq!(config.rpm_for("mistral"), 30);
        assert_eq!(config.temperature, 2.0);
        assert_eq!(config.port, 3001);
        assert_eq!(config.gemini.api_key, "g-key");
        assert!(!config.openai.has_api_key());
        assert_eq!(config.ollama.base_url.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(config.anthropic_version.as_deref(), Some("2023-06-01"));

        let openai = config.provider_config("openai").unwrap();
        assert_eq!(openai.timeout_seconds, Some(60));
        assert_eq!(openai.max_tokens, Some(400));
    }

    #[test]
    fn test_gemini_key_prefers_gemini_var() {
        let config = WriterlyConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "primary"),
            ("GOOGLE_API_KEY", "secondary"),
        ]));
        assert_eq!(config.gemini.api_key, "primary");
    }

    #[test]
    fn test_builder_pattern() {
        let config = WriterlyConfig::default()
            .with_preferred_provider("OpenAI")
            .with_fallback_order(["ollama"])
            .with_max_input_length(50);

        assert_eq!(config.preferred_provider.as_deref(), Some("openai"));
        assert_eq!(config.fallback_order, vec!["ollama"]);
        assert_eq!(config.max_input_length, 50);
        assert!(config.provider_config("mistral").is_none());
    }
}
