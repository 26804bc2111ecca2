// SPDX-License-Identifier: MIT OR Apache-2.0
//! Embedding-text rendering (C2): turns a [`ParseOutcome`] plus its
//! `data_key` into the single string fed to the embedding client.
//!
//! Deterministic serialization and truncation are invariants here (spec §4.2,
//! §8 invariant 5): the same `(data_key, normalized_form)` must always
//! render the same bytes.

use crate::{Normalized, ParseOutcome};
use serde_json::Value;

/// Maximum length, in characters, of the rendered content before the
/// `data_key` wrapper is applied.
pub const MAX_CONTENT_CHARS: usize = 500;

/// Reserved keys dropped from a structured item's rendered content even
/// though they are not underscore-prefixed.
const RESERVED_KEYS: &[&str] = &["content_type", "structure", "schema"];

fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

/// Render a single value deterministically: scalars render bare, and
/// collections render as their canonical JSON (object keys sort
/// alphabetically since [`serde_json::Map`] is a `BTreeMap` by default,
/// and array order is preserved as-is).
fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(_) | Value::Number(_) => v.to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(v).unwrap_or_default(),
    }
}

/// Render the flattened "k: v | k: v" content for a structured item,
/// dropping underscore-prefixed and reserved keys, then truncating.
fn render_structured_content(map: &std::collections::BTreeMap<String, Value>) -> String {
    let pairs: Vec<String> = map
        .iter()
        .filter(|(k, _)| !k.starts_with('_') && !RESERVED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| format!("{k}: {}", render_value(v)))
        .collect();
    truncate_with_ellipsis(&pairs.join(" | "), MAX_CONTENT_CHARS)
}

/// The portion of `data_key` before its first `[`, then the last `.`-segment
/// of that: `data_key.split('[')[0].split('.')[-1]`. Returns `None` when
/// `data_key` has neither `[` nor `.` (the "trivial" case).
///
/// Note this takes the segment *before* any `[...]` index, not after it:
/// `"items[3].field"` yields `"items"`, not `"field"` or `"3"`.
fn clean_key(data_key: &str) -> Option<&str> {
    if !data_key.contains(['[', '.']) {
        return None;
    }
    let before_index = data_key.split('[').next().unwrap_or(data_key);
    before_index.split('.').next_back()
}

/// Render the embedding text for `data_key`'s parsed [`ParseOutcome`].
///
/// This is a pure function of `(data_key, outcome.normalized)` — the same
/// inputs always produce the same output byte string (spec invariant 5).
#[must_use]
pub fn render(data_key: &str, outcome: &ParseOutcome) -> String {
    match &outcome.normalized {
        Normalized::Structured(map) => {
            let content = render_structured_content(map);
            match clean_key(data_key) {
                Some(key) if key != data_key && !key.is_empty() => format!("{content} ({key})"),
                _ => format!("{data_key}: {content}"),
            }
        }
        Normalized::Unstructured { content, .. } => {
            let truncated = truncate_with_ellipsis(content, MAX_CONTENT_CHARS);
            format!("{data_key}: {truncated}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contex_core::DataFormat;
    use std::collections::BTreeMap;

    fn structured_outcome(map: BTreeMap<String, Value>) -> ParseOutcome {
        ParseOutcome {
            format: DataFormat::Json,
            is_structured: true,
            normalized: Normalized::Structured(map),
        }
    }

    fn unstructured_outcome(content: &str) -> ParseOutcome {
        ParseOutcome {
            format: DataFormat::PlainText,
            is_structured: false,
            normalized: Normalized::Unstructured {
                content: content.to_string(),
                metadata: serde_json::json!({}),
            },
        }
    }

    #[test]
    fn structured_trivial_key_uses_prefix_form() {
        let mut map = BTreeMap::new();
        map.insert("style".to_string(), Value::String("PEP 8".to_string()));
        map.insert("max_line_length".to_string(), Value::from(100));
        let out = structured_outcome(map);
        let rendered = render("coding_standards", &out);
        assert_eq!(rendered, "coding_standards: max_line_length: 100 | style: PEP 8");
    }

    #[test]
    fn structured_nested_key_uses_suffix_form() {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Value::String("Ada".to_string()));
        let out = structured_outcome(map);
        // clean_key takes the segment before the `[` index, not after it:
        // "users[2].profile" -> "users".
        let rendered = render("users[2].profile", &out);
        assert_eq!(rendered, "name: Ada (users)");
    }

    #[test]
    fn reserved_and_underscore_keys_are_dropped() {
        let mut map = BTreeMap::new();
        map.insert("content_type".to_string(), Value::String("markdown".to_string()));
        map.insert("schema".to_string(), Value::String("ignored".to_string()));
        map.insert("_internal".to_string(), Value::String("ignored".to_string()));
        map.insert("title".to_string(), Value::String("Doc".to_string()));
        let out = structured_outcome(map);
        let rendered = render("doc.meta", &out);
        assert_eq!(rendered, "title: Doc (meta)");
    }

    #[test]
    fn unstructured_uses_data_key_prefix() {
        let out = unstructured_outcome("hello world");
        assert_eq!(render("notes.txt", &out), "notes.txt: hello world");
    }

    #[test]
    fn content_exactly_500_chars_is_not_truncated() {
        let content = "a".repeat(500);
        let out = unstructured_outcome(&content);
        let rendered = render("k", &out);
        assert_eq!(rendered, format!("k: {content}"));
        assert_eq!(content.len(), 500);
    }

    #[test]
    fn content_501_chars_truncates_to_500_plus_ellipsis() {
        let content = "a".repeat(501);
        let out = unstructured_outcome(&content);
        let rendered = render("k", &out);
        let expected_content = format!("{}...", "a".repeat(500));
        assert_eq!(rendered, format!("k: {expected_content}"));
        assert_eq!(expected_content.len(), 503);
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), Value::from(2));
        map.insert("a".to_string(), Value::from(1));
        let out = structured_outcome(map);
        let r1 = render("k", &out);
        let r2 = render("k", &out);
        assert_eq!(r1, r2);
        // BTreeMap iteration order is alphabetical regardless of insertion order.
        assert!(r1.contains("a: 1 | b: 2"));
    }

    #[test]
    fn collections_render_as_canonical_json() {
        let mut map = BTreeMap::new();
        map.insert(
            "tags".to_string(),
            Value::Array(vec![Value::String("x".into()), Value::String("y".into())]),
        );
        let out = structured_outcome(map);
        let rendered = render("k", &out);
        assert_eq!(rendered, r#"k: tags: ["x","y"]"#);
    }

    #[test]
    fn clean_key_trivial_when_no_separators() {
        assert_eq!(clean_key("plain_key"), None);
    }

    #[test]
    fn clean_key_handles_bracket_and_dot() {
        // Takes the segment *before* the bracketed index, then the last
        // dot-segment of that — matching `data_key.split('[')[0].split('.')[-1]`.
        assert_eq!(clean_key("items[3].field"), Some("items"));
        assert_eq!(clean_key("a.b.c"), Some("c"));
        assert_eq!(clean_key("arr[5]"), Some("arr"));
    }
}
