use crate::activity::ActivityLog;
use dashmap::DashMap;
use std::sync::Arc;
use writerly_core::{MetricsRecorder, Orchestrator, ProviderRegistry, Sanitizer, VoiceSettings, WriterlyConfig};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sanitizer: Sanitizer,
    /// Stored voice defaults per user id.
    pub voice_defaults: Arc<DashMap<String, VoiceSettings>>,
    pub activity: Arc<ActivityLog>,
}

impl AppState {
    /// Wire an orchestrator over `registry` with activity tracking attached.
    pub fn new(registry: ProviderRegistry, config: WriterlyConfig) -> Self {
        let activity = Arc::new(ActivityLog::default());
        let sanitizer = Sanitizer::new(config.max_input_length);
        let orchestrator = Orchestrator::new(registry, config).with_observer(activity.clone());

        Self {
            orchestrator: Arc::new(orchestrator),
            sanitizer,
            voice_defaults: Arc::new(DashMap::new()),
            activity,
        }
    }

    /// Build providers from `config` and wire everything up.
    pub fn from_config(config: WriterlyConfig) -> Self {
        let registry = writerly_ai::registry_from_config(&config);
        Self::new(registry, config)
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        self.orchestrator.metrics()
    }

    /// The user's stored defaults, empty if none were saved.
    pub fn stored_voice(&self, user_id: &str) -> VoiceSettings {
        self.voice_defaults
            .get(user_id)
            .map(|v| *v.value())
            .unwrap_or_default()
    }

    pub fn store_voice(&self, user_id: &str, settings: VoiceSettings) {
        self.voice_defaults.insert(user_id.to_string(), settings);
    }
}
