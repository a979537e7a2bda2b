//! Input screening for text that will be embedded into prompts.
//!
//! Plain natural-language text passes through with control and zero-width
//! characters removed. Anything that looks like a structured payload or a
//! prompt-injection attempt is refused outright rather than escaped.

use crate::error::SanitizeError;
use regex::RegexSet;
use serde_json::Value;
use std::sync::OnceLock;

/// Default maximum input length, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 10_000;

/// Request body fields that may only ever be set server-side.
pub const FORBIDDEN_TOOL_FIELDS: &[&str] = &[
    "tools",
    "tool",
    "functionCallingConfig",
    "functionCalling",
    "functions",
    "function",
    "function_declarations",
    "toolConfig",
];

const STRUCTURED_PAYLOAD_PATTERNS: &[&str] = &[
    // JSON-like objects and arrays
    r#"\{[\s\S]*"[^"]*"\s*:\s*[^}]*\}"#,
    r#"\[[\s\S]*"[^"]*"[\s\S]*\]"#,
    // XML/HTML tag pairs and self-closing tags
    r"<[a-zA-Z][a-zA-Z0-9]*[^>]*>[\s\S]*</[a-zA-Z][a-zA-Z0-9]*>",
    r"<[a-zA-Z][a-zA-Z0-9]*[^>]*/>",
    // Fenced code blocks
    r"```[\s\S]*?```",
    r"~~~[\s\S]*?~~~",
    // Long bracketed blocks
    r"\{[^}]{50,}\}",
    r"\[[^\]]{50,}\]",
];

const INJECTION_PATTERNS: &[&str] = &[
    // Instruction delimiters
    r"(?i)\[INST\]",
    r"(?i)\[/INST\]",
    r"(?i)<\|im_start\|>",
    r"(?i)<\|im_end\|>",
    r"(?i)<\|endoftext\|>",
    r"(?i)</s>",
    r"(?i)<s>",
    // Instruction headers
    r"(?i)###\s*Instruction:?",
    r"(?i)###\s*System:?",
    r"(?i)###\s*User:?",
    r"(?i)###\s*Assistant:?",
    r"(?i)##\s*Instruction:?",
    r"(?i)##\s*System:?",
    // Role switching
    r"(?im)^\s*(?:system|assistant|user|admin|root):\s*.*?(?:ignore|override|forget|disregard|skip|do not)",
    r"(?i)role\s*:\s*(?:system|assistant|admin)",
    r"(?i)you are now (?:a|an) (?:system|assistant|admin)",
    // Instruction overrides
    r"(?i)ignore (?:previous|all|above|instructions?)",
    r"(?i)forget (?:previous|all|above|instructions?)",
    r"(?i)disregard (?:previous|all|above|instructions?)",
    r"(?i)override (?:previous|all|above|instructions?)",
    r"(?i)skip (?:previous|all|above|instructions?)",
    r"(?i)new instruction:?",
    r"(?i)here is the new instruction:?",
    // Privilege escalation
    r"(?i)(?:you are|act as|pretend to be|roleplay as) (?:a|an) (?:system|administrator|admin|root)",
    r"(?i)(?:system|admin|root) (?:mode|access|privileges?)",
    // Output manipulation
    r"(?i)output (?:only|just) (?:the|this|following):?",
    r"(?i)(?:never|don't|do not) (?:say|mention|include|output)",
];

struct Patterns {
    structured: RegexSet,
    injection: RegexSet,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        structured: RegexSet::new(STRUCTURED_PAYLOAD_PATTERNS).expect("structured payload patterns compile"),
        injection: RegexSet::new(INJECTION_PATTERNS).expect("injection patterns compile"),
    })
}

/// Screens and normalizes raw user text.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    max_length: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl Sanitizer {
    /// Create a sanitizer with the given character limit.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// The configured character limit.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Validate `text` and return its cleaned form.
    ///
    /// Length is counted in characters, not bytes.
    pub fn sanitize(&self, text: &str) -> Result<String, SanitizeError> {
        if text.chars().count() > self.max_length {
            return Err(SanitizeError::LengthExceeded {
                max: self.max_length,
            });
        }

        let patterns = patterns();
        if patterns.structured.is_match(text) {
            return Err(SanitizeError::StructuredPayload);
        }
        if patterns.injection.is_match(text) {
            return Err(SanitizeError::PromptInjection);
        }

        let cleaned: String = text.chars().filter(|c| !is_stripped(*c)).collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Err(SanitizeError::EmptyAfterSanitization);
        }

        Ok(cleaned.to_string())
    }

    /// Validate raw bytes, rejecting anything that is not UTF-8.
    pub fn sanitize_bytes(&self, bytes: &[u8]) -> Result<String, SanitizeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| SanitizeError::InvalidEncoding)?;
        self.sanitize(text)
    }

    /// Validate an untyped JSON value; only strings are accepted.
    pub fn sanitize_value(&self, value: &Value) -> Result<String, SanitizeError> {
        match value {
            Value::String(text) => self.sanitize(text),
            _ => Err(SanitizeError::InvalidType),
        }
    }
}

/// Sanitize with an explicit limit.
pub fn sanitize(text: &str, max_length: usize) -> Result<String, SanitizeError> {
    Sanitizer::new(max_length).sanitize(text)
}

/// Reject request bodies that try to smuggle tool/function-calling config.
pub fn validate_no_tool_injection(body: &Value) -> Result<(), SanitizeError> {
    let Some(object) = body.as_object() else {
        return Ok(());
    };

    match FORBIDDEN_TOOL_FIELDS
        .iter()
        .find(|field| object.contains_key(**field))
    {
        Some(field) => Err(SanitizeError::ToolInjection {
            field: (*field).to_string(),
        }),
        None => Ok(()),
    }
}

/// Control characters (tab, LF and CR excluded) plus zero-width separators and BOM.
fn is_stripped(c: char) -> bool {
    matches!(
        c,
        '\u{00}'..='\u{08}'
            | '\u{0B}'
            | '\u{0C}'
            | '\u{0E}'..='\u{1F}'
            | '\u{7F}'..='\u{9F}'
            | '\u{200B}'..='\u{200D}'
            | '\u{FEFF}'
    )
}
