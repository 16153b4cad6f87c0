//! Structured response parsing.
//!
//! Models frequently wrap JSON in Markdown fences or explanatory prose.
//! [`extract`] recovers the first JSON value of the expected shape:
//!
//! 1. Strip ```` ```json ```` / ```` ``` ```` fences
//! 2. Trim to the first balanced `{...}` or `[...]` span
//! 3. Strict parse
//! 4. Best-effort scan of later spans, then the widest open-to-close span
//!
//! When several JSON values appear only the first balanced one is used.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::error::ParseError;

/// Result type alias for parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// The top-level JSON shape a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    /// A `{...}` value.
    Object,
    /// A `[...]` value.
    Array,
}

impl ExpectedShape {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedShape::Object => "object",
            ExpectedShape::Array => "array",
        }
    }

    fn open(&self) -> char {
        match self {
            ExpectedShape::Object => '{',
            ExpectedShape::Array => '[',
        }
    }

    fn close(&self) -> char {
        match self {
            ExpectedShape::Object => '}',
            ExpectedShape::Array => ']',
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ExpectedShape::Object => value.is_object(),
            ExpectedShape::Array => value.is_array(),
        }
    }
}

impl fmt::Display for ExpectedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract a JSON value of the expected shape from raw model text.
pub fn extract(raw: &str, shape: ExpectedShape) -> ParseResult<Value> {
    let body = strip_code_fences(raw);

    let strict_error = match balanced_span(body, shape, 0) {
        Some((_, span)) => match serde_json::from_str::<Value>(span) {
            Ok(value) if shape.matches(&value) => return Ok(value),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        },
        None => None,
    };

    if let Some(value) = best_effort(body, shape) {
        debug!(shape = %shape, "Recovered JSON via best-effort scan");
        return Ok(value);
    }

    // Fences may have cut off the JSON, e.g. a stray ``` inside prose
    if body.len() != raw.trim().len() {
        if let Some(value) = best_effort(raw, shape) {
            debug!(shape = %shape, "Recovered JSON outside code fences");
            return Ok(value);
        }
    }

    match strict_error {
        Some(message) => Err(ParseError::Invalid {
            expected: shape.to_string(),
            message,
        }),
        None => Err(ParseError::NoStructure {
            expected: shape.to_string(),
            preview: raw.chars().take(100).collect(),
        }),
    }
}

/// Extract and deserialize into `T`.
pub fn extract_as<T: DeserializeOwned>(raw: &str, shape: ExpectedShape) -> ParseResult<T> {
    let value = extract(raw, shape)?;
    serde_json::from_value(value).map_err(|e| ParseError::Shape {
        message: e.to_string(),
    })
}

/// Return the contents of the first Markdown code block, or the trimmed text
/// when there is none. An unterminated fence runs to the end of the text.
pub fn strip_code_fences(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text.trim();
    };

    let after = &text[start + 3..];
    // Skip an info string such as `json` up to the end of the line
    let content_start = match after.find('\n') {
        Some(newline) if after[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            newline + 1
        }
        _ => after
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after.len()),
    };
    let content = &after[content_start..];

    let inner = match content.find("```") {
        Some(end) => &content[..end],
        None => content,
    };
    inner.trim()
}

/// Find the first balanced span of `shape` starting at or after byte `from`.
///
/// Brackets inside string literals are ignored. Returns the span's start
/// offset and its text.
fn balanced_span(text: &str, shape: ExpectedShape, from: usize) -> Option<(usize, &str)> {
    let start = from + text.get(from..)?.find(shape.open())?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    if ch != shape.close() {
                        return None;
                    }
                    let end = start + offset + ch.len_utf8();
                    return Some((start, &text[start..end]));
                }
            }
            _ => {}
        }
    }

    None
}

/// Opening delimiters tried by [`best_effort`] before giving up on the scan.
///
/// Each attempt is linear in the remaining text, so this bounds the scan.
const MAX_SCAN_STARTS: usize = 64;

/// Try each later opening delimiter, then the widest first-open to last-close span.
fn best_effort(text: &str, shape: ExpectedShape) -> Option<Value> {
    let mut from = 0;
    let mut attempts = 0;
    while let Some(offset) = text.get(from..).and_then(|t| t.find(shape.open())) {
        attempts += 1;
        if attempts > MAX_SCAN_STARTS {
            debug!(shape = %shape, attempts, "Best-effort scan limit reached");
            break;
        }
        let start = from + offset;
        if let Some((_, span)) = balanced_span(text, shape, start) {
            if let Ok(value) = serde_json::from_str::<Value>(span) {
                if shape.matches(&value) {
                    return Some(value);
                }
            }
        }
        from = start + 1;
    }

    let start = text.find(shape.open())?;
    let end = text.rfind(shape.close())?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(|v| shape.matches(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    // ========================================================================
    // Fences
    // ========================================================================

    #[test]
    fn test_extract_from_json_fence() {
        let raw = "```json\n{\"core_claim\": \"AI demand\"}\n```";
        let value = extract(raw, ExpectedShape::Object).unwrap();
        assert_eq!(value, json!({"core_claim": "AI demand"}));
    }

    #[test]
    fn test_extract_from_bare_fence() {
        let raw = "```\n[1, 2, 3]\n```";
        let value = extract(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[test]
    fn test_extract_fence_surrounded_by_prose() {
        let raw = "Here is the analysis:\n```json\n{\"a\": 1}\n```\nLet me know if you need more.";
        assert_eq!(extract(raw, ExpectedShape::Object).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_extract_unterminated_fence() {
        let raw = "```json\n{\"a\": 1}";
        assert_eq!(extract(raw, ExpectedShape::Object).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_strip_code_fences_without_fence() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_inline_language_tag() {
        assert_eq!(strip_code_fences("```json{\"a\": 1}```"), "{\"a\": 1}");
    }

    // ========================================================================
    // Prose and boundaries
    // ========================================================================

    #[test]
    fn test_extract_with_leading_and_trailing_prose() {
        let raw = "Sure! The result is {\"claim\": \"growth\", \"n\": [1, 2]} as requested.";
        let value = extract(raw, ExpectedShape::Object).unwrap();
        assert_eq!(value, json!({"claim": "growth", "n": [1, 2]}));
    }

    #[test]
    fn test_extract_ignores_brackets_inside_strings() {
        let raw = r#"prefix {"text": "a } tricky ] string", "ok": true} suffix"#;
        let value = extract(raw, ExpectedShape::Object).unwrap();
        assert_eq!(value["ok"], json!(true));
        assert_eq!(value["text"], json!("a } tricky ] string"));
    }

    #[test]
    fn test_extract_handles_escaped_quotes() {
        let raw = r#"{"quote": "he said \"buy {now}\"", "n": 1}"#;
        let value = extract(raw, ExpectedShape::Object).unwrap();
        assert_eq!(value["n"], json!(1));
    }

    #[test]
    fn test_extract_uses_first_of_multiple_objects() {
        let raw = r#"{"first": 1} and then {"second": 2}"#;
        let value = extract(raw, ExpectedShape::Object).unwrap();
        assert_eq!(value, json!({"first": 1}));
    }

    #[test]
    fn test_extract_array_nested_in_object() {
        let raw = r#"{"signals": [{"name": "Capex"}]}"#;
        let value = extract(raw, ExpectedShape::Array).unwrap();
        assert_eq!(value, json!([{"name": "Capex"}]));
    }

    #[test]
    fn test_extract_best_effort_skips_non_json_braces() {
        let raw = r#"Use {placeholders} like this: {"a": 1}"#;
        let value = extract(raw, ExpectedShape::Object).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    // ========================================================================
    // Failures
    // ========================================================================

    #[test]
    fn test_extract_no_structure() {
        let err = extract("I cannot help with that.", ExpectedShape::Object).unwrap_err();
        assert!(matches!(err, ParseError::NoStructure { .. }));
    }

    #[test]
    fn test_extract_unbalanced() {
        let err = extract("{\"a\": [1, 2", ExpectedShape::Object).unwrap_err();
        assert!(matches!(err, ParseError::NoStructure { .. }));
    }

    #[test]
    fn test_extract_invalid_json_in_balanced_span() {
        let err = extract("{a: 1, b: 2}", ExpectedShape::Object).unwrap_err();
        assert!(matches!(err, ParseError::Invalid { .. }));
    }

    #[test]
    fn test_extract_after_unbalanced_openers() {
        let raw = "{{{ {\"a\": 1}";
        assert_eq!(extract(raw, ExpectedShape::Object).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_extract_long_run_of_openers_is_bounded() {
        let raw = "{".repeat(200_000);
        let err = extract(&raw, ExpectedShape::Object).unwrap_err();
        assert!(matches!(err, ParseError::NoStructure { .. }));

        let raw = format!("{}{{\"a\": 1}}", "[".repeat(200_000));
        assert!(extract(&raw, ExpectedShape::Array).is_err());
    }

    #[test]
    fn test_extract_empty_input() {
        assert!(extract("", ExpectedShape::Array).is_err());
    }

    // ========================================================================
    // Typed extraction
    // ========================================================================

    #[derive(Debug, Deserialize, PartialEq)]
    struct Claim {
        core_claim: String,
    }

    #[test]
    fn test_extract_as_typed() {
        let claim: Claim =
            extract_as("```json\n{\"core_claim\": \"x\"}\n```", ExpectedShape::Object).unwrap();
        assert_eq!(claim.core_claim, "x");
    }

    #[test]
    fn test_extract_as_shape_mismatch() {
        let err = extract_as::<Claim>("{\"other\": 1}", ExpectedShape::Object).unwrap_err();
        assert!(matches!(err, ParseError::Shape { .. }));
    }
}
