//! Recovers the JSON payload from free-form model text.
//!
//! Models often wrap their answer in prose or code fences despite being told
//! not to, so decoding tries three strategies in order: the whole text, the
//! first fenced block holding an object, then the first balanced `{...}` span.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::CallError;
use crate::prompt::ResponseFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    Strict,
    Fenced,
    BraceScan,
}

fn fenced_block() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?[ \t]*\r?\n(\{.*?\})\s*```").expect("fenced block pattern")
    })
}

fn strict(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

fn fenced(text: &str) -> Option<Value> {
    let body = fenced_block().captures(text)?.get(1)?.as_str();
    serde_json::from_str(body).ok()
}

/// Returns the first balanced top-level `{...}` span.
///
/// Braces inside string literals are counted like any other brace, so a
/// string value containing an unmatched `{` or `}` can throw the span off.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    for (idx, ch) in text.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|begin| &text[begin..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

fn brace_scan(text: &str) -> Option<Value> {
    serde_json::from_str(first_balanced_object(text)?).ok()
}

/// Decodes `text`, reporting which strategy succeeded.
pub fn decode_with_strategy(text: &str) -> Option<(Value, DecodeStrategy)> {
    if let Some(value) = strict(text) {
        return Some((value, DecodeStrategy::Strict));
    }
    if let Some(value) = fenced(text) {
        return Some((value, DecodeStrategy::Fenced));
    }
    brace_scan(text).map(|value| (value, DecodeStrategy::BraceScan))
}

/// Decodes `text` into a JSON document, or explains the expected format.
pub fn decode(text: &str, format: &ResponseFormat) -> Result<Value, CallError> {
    match decode_with_strategy(text) {
        Some((value, strategy)) => {
            tracing::trace!(?strategy, "decoded model response");
            Ok(value)
        }
        None => Err(CallError::MalformedPayload {
            error_message: "Message format doesn't adhere to the expected format".into(),
            error_details: vec!["no JSON object found in the response".into()],
            valid_format: format.to_json(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolRegistry;
    use serde_json::json;

    const PAYLOAD: &str = r#"{"thought":"t","action":{"function":"finish_conversation","arguments":{"final_answer":"42"}}}"#;

    fn expected() -> Value {
        serde_json::from_str(PAYLOAD).unwrap()
    }

    #[test]
    fn parses_clean_json_strictly() {
        let (value, strategy) = decode_with_strategy(PAYLOAD).unwrap();
        assert_eq!(value, expected());
        assert_eq!(strategy, DecodeStrategy::Strict);
    }

    #[test]
    fn extracts_fenced_block_after_prose() {
        let text = format!("Sure!\n```json\n{PAYLOAD}\n```");
        let (value, strategy) = decode_with_strategy(&text).unwrap();
        assert_eq!(value, expected());
        assert_eq!(strategy, DecodeStrategy::Fenced);
    }

    #[test]
    fn extracts_untagged_fence() {
        let text = format!("Here you go:\n```\n{PAYLOAD}\n```\nAnything else?");
        let (value, strategy) = decode_with_strategy(&text).unwrap();
        assert_eq!(value, expected());
        assert_eq!(strategy, DecodeStrategy::Fenced);
    }

    #[test]
    fn scans_for_braces_inside_prose() {
        let text = format!("I will finish now. {PAYLOAD} Hope that helps!");
        let (value, strategy) = decode_with_strategy(&text).unwrap();
        assert_eq!(value, expected());
        assert_eq!(strategy, DecodeStrategy::BraceScan);
    }

    #[test]
    fn prose_wrapping_recovers_the_same_document() {
        let inner = json!({"thought": "calc", "action": {"function": "calculate", "arguments": {"formula": "1+1"}}});
        let rendered = inner.to_string();
        for text in [
            format!("Leading words {rendered}"),
            format!("{rendered} trailing words"),
            format!("Leading\n```json\n{rendered}\n```\ntrailing"),
        ] {
            assert_eq!(decode_with_strategy(&text).unwrap().0, inner);
        }
    }

    #[test]
    fn inline_fence_falls_back_to_brace_scan() {
        let text = "```json {\"thought\":\"x\"}```";
        let (value, strategy) = decode_with_strategy(text).unwrap();
        assert_eq!(value, json!({"thought": "x"}));
        assert_eq!(strategy, DecodeStrategy::BraceScan);
    }

    #[test]
    fn broken_fence_body_is_not_recovered() {
        let text = "```json\n{\"thought\": }\n```\nactually: {\"thought\":\"x\"}";
        assert!(decode_with_strategy(text).is_none());
    }

    #[test]
    fn unbalanced_braces_in_strings_are_not_tracked() {
        assert_eq!(
            first_balanced_object(r#"{"a": "}"}"#),
            Some(r#"{"a": "}"#)
        );
    }

    #[test]
    fn reports_malformed_payload_with_reminder() {
        let registry = ToolRegistry::new();
        let format = ResponseFormat::for_registry(&registry);

        let err = decode("I cannot answer that.", &format).unwrap_err();

        assert_eq!(err.code(), "MALFORMED PAYLOAD");
        let payload = err.to_payload();
        assert!(payload["reminder"]["valid_format"]["thought"].is_string());
    }
}
