//! Rolling latency samples with nearest-rank percentile summaries.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Most recent samples kept per channel.
pub const MAX_SAMPLES: usize = 1000;

/// Grammar-check round trips.
pub const GRAMMAR_CHANNEL: &str = "grammar";

/// Every successful AI generation, regardless of provider.
pub const AI_CHANNEL: &str = "ai";

/// Time spent on requests that ended in the fallback response.
pub const FALLBACK_CHANNEL: &str = "ai:fallback";

/// Channel name for one provider, e.g. `ai:openai`.
pub fn provider_channel(provider: &str) -> String {
    format!("{}:{}", AI_CHANNEL, provider)
}

/// Bounded FIFO of samples.
#[derive(Debug, Clone, Default)]
struct RollingWindow {
    values: VecDeque<f64>,
}

impl RollingWindow {
    fn push(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > MAX_SAMPLES {
            self.values.pop_front();
        }
    }

    fn summary(&self) -> MetricSummary {
        let mut sorted: Vec<f64> = self.values.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        if n == 0 {
            return MetricSummary::default();
        }

        let pick = |p: f64| {
            let index = (p * (n - 1) as f64).floor() as usize;
            sorted[index.min(n - 1)]
        };
        let sum: f64 = sorted.iter().sum();

        MetricSummary {
            count: n,
            min: Some(sorted[0]),
            max: Some(sorted[n - 1]),
            avg: Some((sum / n as f64 * 100.0).round() / 100.0),
            p50: Some(pick(0.5)),
            p95: Some(pick(0.95)),
            p99: Some(pick(0.99)),
        }
    }
}

/// Summary statistics for one channel. Empty channels report `null`s.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

/// Process-wide latency store, shared by reference.
#[derive(Debug)]
pub struct MetricsRecorder {
    buckets: DashMap<String, RollingWindow>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    /// Create a recorder with the fixed `grammar` and `ai` channels in place.
    pub fn new() -> Self {
        let buckets = DashMap::new();
        buckets.insert(GRAMMAR_CHANNEL.to_string(), RollingWindow::default());
        buckets.insert(AI_CHANNEL.to_string(), RollingWindow::default());
        Self { buckets }
    }

    /// Record a latency in milliseconds.
    ///
    /// Negative and non-finite values are dropped without error; unseen
    /// channels are created on first write.
    pub fn record(&self, channel: &str, value_ms: f64) {
        if !value_ms.is_finite() || value_ms < 0.0 {
            return;
        }
        self.buckets
            .entry(channel.to_string())
            .or_default()
            .push(value_ms);
    }

    /// Record an elapsed duration.
    pub fn record_duration(&self, channel: &str, elapsed: Duration) {
        self.record(channel, elapsed.as_millis() as f64);
    }

    /// Summary for a single channel, if it exists.
    pub fn summary(&self, channel: &str) -> Option<MetricSummary> {
        self.buckets.get(channel).map(|bucket| bucket.summary())
    }

    /// Summaries for every channel, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, MetricSummary> {
        self.buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().summary()))
            .collect()
    }
}
