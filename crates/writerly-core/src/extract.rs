//! Layered extraction of suggestion lists from model output.
//!
//! Models asked for strict JSON still wrap it in prose or code fences. Each
//! layer below is callable on its own; [`extract_suggestions`] runs them in
//! order and reports which one matched.

use crate::generation::{Suggestion, SuggestionCategory};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Which layer produced an [`Extraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionLayer {
    /// The whole text was valid JSON.
    Direct,
    /// Code fences stripped, then the outermost `{...}` parsed.
    Fenced,
    /// A `"suggestions": [...]` fragment was located by its key.
    Keyed,
}

/// Suggestions recovered from a model response.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub layer: ExtractionLayer,
    pub suggestions: Vec<Suggestion>,
}

/// Parse the whole text as JSON.
pub fn parse_direct(raw: &str) -> Option<Vec<Suggestion>> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    suggestions_from_value(&value)
}

/// Strip leading and trailing fence markers, then parse between the first
/// `{` and the last `}`.
pub fn parse_fenced(raw: &str) -> Option<Vec<Suggestion>> {
    let unfenced = outer_fences().replace_all(raw.trim(), "");
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: Value = serde_json::from_str(&unfenced[start..=end]).ok()?;
    suggestions_from_value(&value)
}

/// Find a `"suggestions": [...]` fragment anywhere in the text.
///
/// The array is read from its opening bracket up to its own closing bracket;
/// whatever follows is ignored.
pub fn parse_keyed(raw: &str) -> Option<Vec<Suggestion>> {
    keyed_array().find_iter(raw).find_map(|key| {
        let open = key.end() - 1;
        let array = serde_json::Deserializer::from_str(&raw[open..])
            .into_iter::<Value>()
            .next()?
            .ok()?;
        suggestions_from_value(&array)
    })
}

/// Run every layer in order and return the first that yields a list.
pub fn extract_suggestions(raw: &str) -> Option<Extraction> {
    let layers: [(ExtractionLayer, fn(&str) -> Option<Vec<Suggestion>>); 3] = [
        (ExtractionLayer::Direct, parse_direct),
        (ExtractionLayer::Fenced, parse_fenced),
        (ExtractionLayer::Keyed, parse_keyed),
    ];

    layers.into_iter().find_map(|(layer, parse)| {
        parse(raw).map(|suggestions| Extraction { layer, suggestions })
    })
}

/// A fence opening the text or closing it. Fences inside are left alone.
fn outer_fences() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"^(?:```|~~~)[A-Za-z0-9_-]*|(?:```|~~~)$").expect("valid fence pattern")
    })
}

/// The `"suggestions": [` key up to and including the bracket.
fn keyed_array() -> &'static Regex {
    static KEYED: OnceLock<Regex> = OnceLock::new();
    KEYED.get_or_init(|| Regex::new(r#""suggestions"\s*:\s*\["#).expect("valid suggestions pattern"))
}

/// Accept `{"suggestions": [...]}` or a bare array.
fn suggestions_from_value(value: &Value) -> Option<Vec<Suggestion>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("suggestions")?.as_array()?,
        _ => return None,
    };

    Some(
        items
            .iter()
            .filter_map(Value::as_object)
            .map(suggestion_from_map)
            .collect(),
    )
}

fn suggestion_from_map(map: &Map<String, Value>) -> Suggestion {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    };
    let offset = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k).and_then(Value::as_u64));

    Suggestion {
        message: text(&["message", "explanation"]),
        original: text(&["original"]),
        suggestion: text(&["suggestion", "replacement"]),
        from: offset(&["from", "start"]),
        to: offset(&["to", "end"]),
        category: SuggestionCategory::parse(&text(&["category"])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{"suggestions":[{"message":"Repeated word","original":"the the","suggestion":"the","from":0,"to":7,"category":"Correctness"}]}"#;

    fn expected() -> Vec<Suggestion> {
        vec![Suggestion {
            message: "Repeated word".into(),
            original: "the the".into(),
            suggestion: "the".into(),
            from: Some(0),
            to: Some(7),
            category: SuggestionCategory::Correctness,
        }]
    }

    #[test]
    fn test_direct_layer() {
        let extraction = extract_suggestions(RAW).unwrap();
        assert_eq!(extraction.layer, ExtractionLayer::Direct);
        assert_eq!(extraction.suggestions, expected());
    }

    #[test]
    fn test_fenced_matches_direct() {
        let fenced = format!("Here you go:\n```json\n{}\n```\nHope this helps.", RAW);
        assert!(parse_direct(&fenced).is_none());

        let extraction = extract_suggestions(&fenced).unwrap();
        assert_eq!(extraction.layer, ExtractionLayer::Fenced);
        assert_eq!(extraction.suggestions, expected());
    }

    #[test]
    fn test_keyed_layer() {
        let raw = r#"Result -> "suggestions": [{"message":"m","original":"o","suggestion":"s","category":"delivery"}] (end"#;
        assert!(parse_fenced(raw).is_none());

        let extraction = extract_suggestions(raw).unwrap();
        assert_eq!(extraction.layer, ExtractionLayer::Keyed);
        assert_eq!(extraction.suggestions[0].category, SuggestionCategory::Delivery);
        assert_eq!(extraction.suggestions[0].from, None);
    }

    #[test]
    fn test_keyed_ignores_brackets_after_array() {
        let raw = r#"Sure! "suggestions": [{"message":"Use [brackets] sparingly","original":"o","suggestion":"s"}] (see note [1])"#;
        assert!(parse_fenced(raw).is_none());

        let extraction = extract_suggestions(raw).unwrap();
        assert_eq!(extraction.layer, ExtractionLayer::Keyed);
        assert_eq!(extraction.suggestions.len(), 1);
        assert_eq!(extraction.suggestions[0].message, "Use [brackets] sparingly");
    }

    #[test]
    fn test_keyed_skips_unparsable_occurrence() {
        let raw = r#"The "suggestions": [ list was cut. Retry: "suggestions": [{"message":"m"}] done"#;
        let suggestions = parse_keyed(raw).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].message, "m");
    }

    #[test]
    fn test_fences_inside_strings_survive() {
        let raw = "```json\n{\"suggestions\":[{\"message\":\"Use ```code``` less\",\"original\":\"~~~x\"}]}\n```";
        let extraction = extract_suggestions(raw).unwrap();
        assert_eq!(extraction.layer, ExtractionLayer::Fenced);
        assert_eq!(extraction.suggestions[0].message, "Use ```code``` less");
        assert_eq!(extraction.suggestions[0].original, "~~~x");
    }

    #[test]
    fn test_bare_array_and_lenient_fields() {
        let raw = r#"[{"explanation":"e","original":"o","replacement":"r","start":3,"end":-1,"category":"Style"}, 42]"#;
        let suggestions = parse_direct(raw).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].message, "e");
        assert_eq!(suggestions[0].suggestion, "r");
        assert_eq!(suggestions[0].from, Some(3));
        assert_eq!(suggestions[0].to, None);
        assert_eq!(suggestions[0].category, SuggestionCategory::Clarity);
    }

    #[test]
    fn test_empty_list_is_a_match() {
        let extraction = extract_suggestions(r#"{"suggestions": []}"#).unwrap();
        assert!(extraction.suggestions.is_empty());
    }

    #[test]
    fn test_prose_yields_nothing() {
        assert!(extract_suggestions("The text reads well; no changes needed.").is_none());
        assert!(extract_suggestions(r#"{"result": "ok"}"#).is_none());
    }
}
