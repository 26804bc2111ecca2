// SPDX-License-Identifier: MIT OR Apache-2.0
//! YAML parser: priority 1.
//!
//! YAML's syntax overlaps heavily with plain prose (`key: value` resembles
//! a sentence with a colon), so this parser is deliberately conservative:
//! it rejects input that reads like natural language and requires at least
//! one unambiguous YAML structural pattern before even attempting a decode.

use crate::{Normalized, ParseFailure, ParseOutcome};
use contex_core::DataFormat;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Sentence terminators counted when scoring "looks like prose".
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?'];

/// A small closed set of natural-language cue words. Two or more of these
/// combined with two or more sentence terminators flags the input as prose
/// rather than YAML.
const PROSE_CUE_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "this", "that", "these",
    "those", "and", "but", "with", "for", "please", "should", "would",
];

fn looks_like_prose(raw: &str) -> bool {
    let terminator_count = raw.chars().filter(|c| SENTENCE_TERMINATORS.contains(c)).count();
    if terminator_count < 2 {
        return false;
    }
    let lower = raw.to_lowercase();
    let cue_count = PROSE_CUE_WORDS
        .iter()
        .filter(|w| {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|tok| tok == **w)
        })
        .count();
    cue_count >= 2
}

/// At least one YAML structural pattern must be present: a `key: value`
/// pair, a `- item` under a key, or a bare `key:` followed by an indented
/// child line.
fn has_yaml_structure(raw: &str) -> bool {
    let lines: Vec<&str> = raw.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') || trimmed.is_empty() {
            continue;
        }
        if let Some(colon) = trimmed.find(':') {
            let key_part = &trimmed[..colon];
            if !key_part.is_empty()
                && key_part
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ')
            {
                let rest = trimmed[colon + 1..].trim();
                if !rest.is_empty() {
                    return true; // key: value
                }
                // bare `key:` — structural only if followed by an indented child
                let indent = line.len() - trimmed.len();
                if lines[i + 1..].iter().any(|next| {
                    let next_trim = next.trim_start();
                    !next_trim.is_empty() && (next.len() - next_trim.len()) > indent
                }) {
                    return true;
                }
            }
        }
        if trimmed.starts_with("- ") {
            return true; // list item
        }
    }
    false
}

fn is_collection(v: &JsonValue) -> bool {
    matches!(v, JsonValue::Object(_) | JsonValue::Array(_))
}

fn decode(raw: &str) -> Option<BTreeMap<String, JsonValue>> {
    if looks_like_prose(raw) || !has_yaml_structure(raw) {
        return None;
    }
    let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(raw).ok()?;
    let json: JsonValue = serde_json::to_value(&value).ok()?;
    let map = match json {
        JsonValue::Object(map) => map,
        _ => return None,
    };
    if map.len() >= 2 {
        return Some(map.into_iter().collect());
    }
    if map.len() == 1 && map.values().next().is_some_and(is_collection) {
        return Some(map.into_iter().collect());
    }
    None
}

/// Parser for YAML documents (`format_name = "yaml"`, priority 1).
#[derive(Debug, Default)]
pub struct YamlParser;

impl crate::FormatParser for YamlParser {
    fn format(&self) -> DataFormat {
        DataFormat::Yaml
    }

    fn priority(&self) -> u16 {
        1
    }

    fn can_parse(&self, raw: &str, hint: Option<DataFormat>) -> bool {
        hint == Some(DataFormat::Yaml) || decode(raw).is_some()
    }

    fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseFailure> {
        let map = decode(raw).ok_or_else(|| ParseFailure::new("not a recognizable YAML mapping"))?;
        Ok(ParseOutcome {
            format: DataFormat::Yaml,
            is_structured: true,
            normalized: Normalized::Structured(map),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FormatParser;

    #[test]
    fn accepts_two_key_mapping() {
        let p = YamlParser;
        let raw = "title: Notes\nversion: 2\n";
        assert!(p.can_parse(raw, None));
        let out = p.parse(raw).unwrap();
        assert!(out.is_structured);
        match out.normalized {
            Normalized::Structured(m) => {
                assert_eq!(m["title"], JsonValue::String("Notes".into()));
                assert_eq!(m["version"], JsonValue::Number(2.into()));
            }
            _ => panic!("expected structured"),
        }
    }

    #[test]
    fn accepts_single_key_with_list_value() {
        let p = YamlParser;
        let raw = "items:\n  - a\n  - b\n";
        assert!(p.can_parse(raw, None));
        assert!(p.parse(raw).is_ok());
    }

    #[test]
    fn rejects_single_scalar_value() {
        let p = YamlParser;
        let raw = "just_one: scalar\n";
        assert!(!p.can_parse(raw, None));
    }

    #[test]
    fn rejects_prose_with_colons() {
        let p = YamlParser;
        let raw = "Note: this is a sentence. It has punctuation! And more words.";
        assert!(!p.can_parse(raw, None));
    }

    #[test]
    fn rejects_plain_sentence_without_structure() {
        let p = YamlParser;
        assert!(!p.can_parse("This is just a plain sentence with no structure at all.", None));
    }

    #[test]
    fn hint_forces_can_parse_but_parse_may_still_fail() {
        let p = YamlParser;
        assert!(p.can_parse("not yaml structured at all", Some(DataFormat::Yaml)));
        assert!(p.parse("not yaml structured at all").is_err());
    }
}
