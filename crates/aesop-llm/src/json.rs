//! Strict-JSON extraction with bounded recovery.
//!
//! LLM completions are supposed to return a single JSON object, but models
//! occasionally wrap it in prose or a markdown fence. `extract_json` tries the
//! direct parse first and only falls back to scanning for the outermost
//! balanced `{...}` span before giving up -- it never attempts to repair
//! malformed JSON itself.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("could not extract valid JSON from model output")]
pub struct JsonExtractError;

pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T, JsonExtractError> {
    if let Ok(value) = serde_json::from_str::<T>(raw) {
        return Ok(value);
    }

    let trimmed = strip_code_fence(raw);
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    if let Some(span) = balanced_object_span(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(span) {
            return Ok(value);
        }
    }

    Err(JsonExtractError)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("```json").or_else(|| trimmed.strip_prefix("```")).unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Returns the first top-level balanced `{...}` substring, honoring quoted
/// strings so braces inside string literals don't throw off the count.
fn balanced_object_span(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let start = s.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Grade {
        relevance: f64,
        verdict: String,
    }

    #[test]
    fn parses_clean_json() {
        let raw = r#"{"relevance": 0.8, "verdict": "keep"}"#;
        let g: Grade = extract_json(raw).unwrap();
        assert_eq!(g, Grade { relevance: 0.8, verdict: "keep".into() });
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"relevance\": 0.5, \"verdict\": \"discard\"}\n```";
        let g: Grade = extract_json(raw).unwrap();
        assert_eq!(g.verdict, "discard");
    }

    #[test]
    fn parses_json_with_surrounding_prose() {
        let raw = "Sure, here is the grade:\n{\"relevance\": 0.9, \"verdict\": \"keep\"}\nLet me know if you need more.";
        let g: Grade = extract_json(raw).unwrap();
        assert_eq!(g.relevance, 0.9);
    }

    #[test]
    fn braces_inside_strings_dont_break_span_detection() {
        let raw = r#"blah {"relevance": 0.7, "verdict": "keep {not a brace}"} trailing"#;
        let g: Grade = extract_json(raw).unwrap();
        assert_eq!(g.verdict, "keep {not a brace}");
    }

    #[test]
    fn gives_up_on_non_json() {
        let raw = "I cannot produce a grade right now.";
        let result: Result<Grade, _> = extract_json(raw);
        assert!(result.is_err());
    }
}
