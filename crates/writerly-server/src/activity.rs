//! Recent generation activity, fed by the orchestrator observer seam.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use writerly_core::{GenerationRequest, GenerationResult, OrchestratorObserver, RateLimitDecision, Task};

/// Requests kept before the oldest is dropped.
pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Calling,
    RateLimited,
    Failed,
    Succeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    InProgress,
    Succeeded,
    Fallback,
    /// Refused because the explicitly requested provider was over budget.
    RateLimited,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub provider: String,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: String,
    pub task: Task,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub attempts: Vec<ProviderAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActivityEvent {
    fn new(id: &str, request: &GenerationRequest) -> Self {
        Self {
            id: id.to_string(),
            task: request.task,
            user_id: request.user_id.clone(),
            started_at: Utc::now(),
            status: RequestStatus::InProgress,
            attempts: Vec::new(),
            provider: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != RequestStatus::InProgress
    }
}

/// Bounded in-memory log of recent orchestrator requests.
#[derive(Debug)]
pub struct ActivityLog {
    events: DashMap<String, ActivityEvent>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Most recent events first, at most `limit`.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEvent> {
        let mut events: Vec<_> = self.events.iter().map(|e| e.value().clone()).collect();
        events.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| b.id.cmp(&a.id)));
        events.truncate(limit);
        events
    }

    pub fn get(&self, id: &str) -> Option<ActivityEvent> {
        self.events.get(id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn start(&self, id: &str, request: &GenerationRequest) {
        self.events.insert(id.to_string(), ActivityEvent::new(id, request));
        self.evict();
    }

    /// Apply `update` to a tracked event. Events already evicted stay gone.
    fn update(&self, id: &str, update: impl FnOnce(&mut ActivityEvent)) {
        if let Some(mut event) = self.events.get_mut(id) {
            update(&mut *event);
        }
    }

    /// Drop events beyond capacity, oldest finished ones first. In-flight
    /// events go only when nothing finished is left. No map guard may be
    /// held here.
    fn evict(&self) {
        while self.events.len() > self.capacity {
            let oldest = self
                .events
                .iter()
                .min_by(|a, b| {
                    b.is_finished()
                        .cmp(&a.is_finished())
                        .then_with(|| a.started_at.cmp(&b.started_at))
                        .then_with(|| a.id.cmp(&b.id))
                })
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.events.remove(&key);
                }
                None => break,
            }
        }
    }

    fn mark_last(&self, id: &str, provider: &str, status: AttemptStatus, error: Option<&str>) {
        self.update(id, |event| {
            if let Some(attempt) = event.attempts.iter_mut().rev().find(|a| a.provider == provider) {
                attempt.status = status;
                attempt.error = error.map(str::to_string);
            }
        });
    }
}

impl OrchestratorObserver for ActivityLog {
    fn on_start(&self, id: &str, request: &GenerationRequest) {
        self.start(id, request);
    }

    fn on_attempt(&self, id: &str, provider: &str) {
        self.update(id, |event| {
            event.attempts.push(ProviderAttempt {
                provider: provider.to_string(),
                status: AttemptStatus::Calling,
                error: None,
            });
        });
    }

    fn on_rate_limited(&self, id: &str, provider: &str, _decision: &RateLimitDecision) {
        self.mark_last(id, provider, AttemptStatus::RateLimited, None);
    }

    fn on_rejected(&self, id: &str, provider: &str, decision: &RateLimitDecision) {
        self.update(id, |event| {
            event.status = RequestStatus::RateLimited;
            event.error = Some(format!(
                "Rate limit exceeded for provider '{}', retry after {} ms",
                provider, decision.retry_after_ms
            ));
        });
    }

    fn on_provider_failure(&self, id: &str, provider: &str, error: &str) {
        self.mark_last(id, provider, AttemptStatus::Failed, Some(error));
    }

    fn on_success(&self, id: &str, result: &GenerationResult, elapsed: Duration) {
        self.mark_last(id, &result.provider, AttemptStatus::Succeeded, None);
        self.update(id, |event| {
            event.status = RequestStatus::Succeeded;
            event.provider = Some(result.provider.clone());
            event.duration_ms = Some(elapsed.as_millis() as u64);
        });
    }

    fn on_exhausted(&self, id: &str, last_error: &str) {
        self.update(id, |event| {
            event.status = RequestStatus::Fallback;
            event.error = Some(last_error.to_string());
        });
    }
}
