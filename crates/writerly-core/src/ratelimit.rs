//! Fixed-window request limiter keyed by (provider, user).
//!
//! Each key keeps the instants of its recent requests in arrival order.
//! Entries older than the window are pruned lazily when the key is checked;
//! nothing sweeps the map in the background, and a key is never removed once
//! created. Single process only.

use crate::provider::canonical_name;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of the counting window.
pub const WINDOW_MS: u64 = 60_000;

/// Requests per minute when nothing else is configured.
pub const DEFAULT_RPM: u32 = 60;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Outcome of a single [`RateLimiter::consume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Zero when allowed.
    pub retry_after_ms: u64,
    /// Epoch milliseconds at which the oldest counted request leaves the window.
    pub reset_at: u64,
}

/// Per-provider request budgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLimits {
    per_provider: HashMap<String, u32>,
    default_limit: u32,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        let per_provider = ["openai", "anthropic", "gemini", "ollama"]
            .into_iter()
            .map(|name| (name.to_string(), DEFAULT_RPM))
            .collect();
        Self {
            per_provider,
            default_limit: DEFAULT_RPM,
        }
    }
}

impl ProviderLimits {
    /// Override the budget for one provider.
    pub fn with_limit(mut self, provider: &str, rpm: u32) -> Self {
        self.per_provider.insert(canonical_name(provider), rpm);
        self
    }

    /// Budget for providers with no explicit entry.
    pub fn with_default(mut self, rpm: u32) -> Self {
        self.default_limit = rpm;
        self
    }

    /// Requests per minute allowed for `provider`.
    pub fn limit_for(&self, provider: &str) -> u32 {
        self.per_provider
            .get(&canonical_name(provider))
            .copied()
            .unwrap_or(self.default_limit)
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }
}

/// In-memory fixed-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<u64>>,
    limits: ProviderLimits,
    window_ms: u64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(ProviderLimits::default())
    }
}

impl RateLimiter {
    /// Create a limiter with the given provider budgets.
    pub fn new(limits: ProviderLimits) -> Self {
        Self {
            windows: DashMap::new(),
            limits,
            window_ms: WINDOW_MS,
        }
    }

    /// The configured provider budgets.
    pub fn limits(&self) -> &ProviderLimits {
        &self.limits
    }

    /// Key under which a user's requests to a provider are counted.
    pub fn provider_key(provider: &str, user_id: &str) -> String {
        let user = if user_id.trim().is_empty() { "anon" } else { user_id };
        format!("prov:{}:user:{}", canonical_name(provider), user)
    }

    /// Count one request against `key` at the current time.
    pub fn consume(&self, key: &str, limit: u32) -> RateLimitDecision {
        self.consume_at(key, limit, now_ms())
    }

    /// Count one request against `key` at `now` (epoch ms).
    ///
    /// Check and append happen under the key's shard lock, so concurrent
    /// callers cannot both take the last slot.
    pub fn consume_at(&self, key: &str, limit: u32, now: u64) -> RateLimitDecision {
        let mut window = self.windows.entry(key.to_string()).or_default();

        let cutoff = now.saturating_sub(self.window_ms);
        while window.front().is_some_and(|&t| t <= cutoff) {
            window.pop_front();
        }

        let count = window.len() as u32;
        if count >= limit {
            let reset_at = window
                .front()
                .map(|&oldest| oldest + self.window_ms)
                .unwrap_or(now + self.window_ms);
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                retry_after_ms: reset_at.saturating_sub(now),
                reset_at,
            };
        }

        window.push_back(now);
        let reset_at = window.front().copied().unwrap_or(now) + self.window_ms;
        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit - (count + 1),
            retry_after_ms: 0,
            reset_at,
        }
    }

    /// Count one request by `user_id` against `provider`'s budget.
    pub fn consume_provider(&self, user_id: &str, provider: &str) -> RateLimitDecision {
        self.consume_provider_at(user_id, provider, now_ms())
    }

    /// [`consume_provider`](Self::consume_provider) at an explicit instant.
    pub fn consume_provider_at(&self, user_id: &str, provider: &str, now: u64) -> RateLimitDecision {
        let key = Self::provider_key(provider, user_id);
        self.consume_at(&key, self.limits.limit_for(provider), now)
    }

    /// Number of keys ever seen. Keys are never evicted.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
