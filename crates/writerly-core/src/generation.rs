//! Request and result types for AI generation.

use crate::voice::VoiceSettings;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Provider name reported when every candidate failed.
pub const FALLBACK_PROVIDER: &str = "fallback";

/// What the model is asked to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    #[default]
    Rewrite,
    Summarize,
    Expand,
    Suggestions,
}

impl Task {
    /// Parse a task name; anything unrecognized is a rewrite.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "summarize" => Task::Summarize,
            "expand" => Task::Expand,
            "suggestions" => Task::Suggestions,
            _ => Task::Rewrite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Rewrite => "rewrite",
            Task::Summarize => "summarize",
            Task::Expand => "expand",
            Task::Suggestions => "suggestions",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name.map(|n| Task::parse(&n)).unwrap_or_default())
    }
}

/// A single generation request as seen by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub task: Task,
    /// What the user asked for, verbatim.
    pub instruction: String,
    /// Document text the instruction applies to.
    pub context: String,
    /// Already merged over the user's stored defaults.
    pub voice_settings: VoiceSettings,
    /// Provider the caller asked for by name, if any.
    pub explicit_provider: Option<String>,
    pub user_id: String,
}

impl GenerationRequest {
    /// Create a rewrite request for the given user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_voice(mut self, settings: VoiceSettings) -> Self {
        self.voice_settings = settings;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.explicit_provider = Some(provider.into());
        self
    }
}

/// Category of a writing suggestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuggestionCategory {
    Correctness,
    #[default]
    Clarity,
    Engagement,
    Delivery,
}

impl SuggestionCategory {
    /// Case-insensitive parse; unknown labels become `Clarity`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "correctness" => SuggestionCategory::Correctness,
            "engagement" => SuggestionCategory::Engagement,
            "delivery" => SuggestionCategory::Delivery,
            _ => SuggestionCategory::Clarity,
        }
    }
}

/// One actionable edit proposed by the model.
///
/// `from`/`to` are character offsets into the exact context string that was
/// sent with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub message: String,
    pub original: String,
    pub suggestion: String,
    pub from: Option<u64>,
    pub to: Option<u64>,
    pub category: SuggestionCategory,
}

/// Normalized outcome of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub output: String,
    /// Provider that produced the output, or `"fallback"`.
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    /// Whether this is the canned response after every provider failed.
    pub fn is_fallback(&self) -> bool {
        self.provider == FALLBACK_PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_defaults_to_rewrite() {
        assert_eq!(Task::parse("Summarize"), Task::Summarize);
        assert_eq!(Task::parse("freeform"), Task::Rewrite);

        let task: Task = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(task, Task::Rewrite);
        let task: Task = serde_json::from_value(json!("suggestions")).unwrap();
        assert_eq!(task, Task::Suggestions);
    }

    #[test]
    fn test_result_shape() {
        let result = GenerationResult {
            output: "Hi".into(),
            provider: "openai".into(),
            suggestions: None,
            duration_ms: Some(12),
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"output": "Hi", "provider": "openai", "durationMs": 12})
        );
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(SuggestionCategory::parse("delivery"), SuggestionCategory::Delivery);
        assert_eq!(SuggestionCategory::parse("Style"), SuggestionCategory::Clarity);
    }
}
