//! Lenient parsing of structured model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?[ \t]*```\s*$")
        .expect("fence pattern is valid")
});

/// Remove a Markdown code fence wrapping the whole reply, if present.
pub fn strip_code_fences(raw: &str) -> &str {
    FENCE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| raw.trim(), |body| body.as_str().trim())
}

/// Parse a model reply into `T`.
///
/// Returns `None` instead of an error: callers treat an unparseable reply
/// the same as an empty one.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let body = strip_code_fences(raw);
    if let Ok(value) = serde_json::from_str(body) {
        return Some(value);
    }

    // Models sometimes wrap the object in prose.
    let start = body.find(['{', '['])?;
    let end = body.rfind(['}', ']'])?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&body[start..=end]) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(error = %err, "Structured reply did not parse");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::{json, Value};

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Questions {
        questions: Vec<String>,
    }

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1, 2]\n```\n"), "[1, 2]");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_fenced_equals_unfenced() {
        let data = r#"{"questions": ["Срок?", "Бюджет?"]}"#;
        let fenced = format!("```json\n{data}\n```");

        let plain: Option<Value> = parse_structured(data);
        let wrapped: Option<Value> = parse_structured(&fenced);
        assert!(plain.is_some());
        assert_eq!(plain, wrapped);
    }

    #[test]
    fn test_typed_parse() {
        let parsed: Option<Questions> = parse_structured("```JSON\n{\"questions\":[\"Q1\"]}\n```");
        assert_eq!(parsed, Some(Questions { questions: vec!["Q1".to_string()] }));
    }

    #[test]
    fn test_invalid_returns_none() {
        assert!(parse_structured::<Value>("```json\n{not json\n```").is_none());
        assert!(parse_structured::<Value>("").is_none());
        assert!(parse_structured::<Questions>("{\"other\": 1}").is_none());
    }

    #[test]
    fn test_object_inside_prose() {
        let parsed: Option<Value> = parse_structured("Вот ответ: {\"status\":\"complete\"} готово");
        assert_eq!(parsed, Some(json!({"status": "complete"})));
    }
}
