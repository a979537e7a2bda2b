//! Voice settings applied to generated text.
//!
//! Every field is validated against a closed set. Values that fail
//! validation are treated as absent, and absent fields resolve to the fixed
//! defaults through [`VoiceSettings::effective`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

macro_rules! voice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// All accepted values, in display order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Human-readable label used in prompts.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label().eq_ignore_ascii_case(wanted))
                    .ok_or(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

voice_enum!(
    /// Overall tone of voice.
    Tone {
        Neutral => "Neutral",
        Friendly => "Friendly",
        Confident => "Confident",
        Professional => "Professional",
        Direct => "Direct",
        Assertive => "Assertive",
    }
);

voice_enum!(
    /// Who the text is written for.
    Audience {
        General => "General",
        Manager => "Manager",
        Team => "Team",
        Customer => "Customer",
        Student => "Student",
        Engineer => "Engineer",
    }
);

voice_enum!(
    /// What the writer wants to achieve.
    Intent {
        Inform => "Inform",
        Request => "Request",
        Suggest => "Suggest",
        Apologize => "Apologize",
        Persuade => "Persuade",
    }
);

voice_enum!(
    /// Subject-matter register.
    Domain {
        General => "General",
        Academic => "Academic",
        Business => "Business",
        Technical => "Technical",
        Creative => "Creative",
    }
);

/// Lowest and highest accepted formality.
pub const FORMALITY_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Voice settings for one request or one stored user profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub tone: Option<Tone>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_formality")]
    pub formality: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub audience: Option<Audience>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub intent: Option<Intent>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub domain: Option<Domain>,
}

impl VoiceSettings {
    /// Create empty settings (every field absent).
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed default set every absent field resolves to.
    pub fn defaults() -> Self {
        Self {
            tone: Some(Tone::Neutral),
            formality: Some(3),
            audience: Some(Audience::General),
            intent: Some(Intent::Inform),
            domain: Some(Domain::General),
        }
    }

    /// Read settings from an untyped JSON value.
    ///
    /// Accepts either a flat object or one nested under `voice`. Anything
    /// unreadable yields empty settings.
    pub fn from_value(value: &Value) -> Self {
        let value = value.get("voice").unwrap_or(value);
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// Set the tone.
    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    /// Set the formality; values outside 1–5 leave the field absent.
    pub fn with_formality(mut self, formality: u8) -> Self {
        self.formality = Some(formality).filter(|f| FORMALITY_RANGE.contains(f));
        self
    }

    /// Set the audience.
    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.audience = Some(audience);
        self
    }

    /// Set the intent.
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Set the domain.
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Overlay these settings on stored user defaults, field by field.
    pub fn merged_over(&self, stored: &VoiceSettings) -> VoiceSettings {
        VoiceSettings {
            tone: self.tone.or(stored.tone),
            formality: self.formality.or(stored.formality),
            audience: self.audience.or(stored.audience),
            intent: self.intent.or(stored.intent),
            domain: self.domain.or(stored.domain),
        }
    }

    /// Fully resolved settings with defaults filled in.
    pub fn effective(&self) -> VoiceSettings {
        self.merged_over(&Self::defaults())
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(|s| s.parse().ok()))
}

fn lenient_formality<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_formality(&value))
}

/// Formality may arrive as a number or as a Casual/Neutral/Formal label.
fn parse_formality(value: &Value) -> Option<u8> {
    let level = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "casual" => Some(1),
            "neutral" => Some(3),
            "formal" => Some(5),
            other => other.parse().ok(),
        },
        _ => None,
    };
    level.filter(|l| FORMALITY_RANGE.contains(l))
}
