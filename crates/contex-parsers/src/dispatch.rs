// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-priority parser registry and dispatch rule (C1/C2).
//!
//! Parsers are tried in ascending [`FormatParser::priority`] order. The
//! first whose `can_parse` returns true is attempted; if `parse` then
//! fails, dispatch falls through to the next candidate. [`PlainTextParser`]
//! always succeeds, so dispatch never fails outright — a caller observing
//! "no parser succeeded" would indicate a bug in this module, not bad
//! input.

use crate::code::CodeParser;
use crate::csv_parser::CsvParser;
use crate::json::JsonParser;
use crate::markdown::MarkdownParser;
use crate::plaintext::PlainTextParser;
use crate::toml_parser::TomlParser;
use crate::xml::XmlParser;
use crate::yaml::YamlParser;
use crate::{FormatParser, ParseOutcome};
use contex_core::DataFormat;

/// An ordered set of [`FormatParser`]s, tried low-priority-number-first.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn FormatParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    /// Build the canonical registry with every built-in parser in fixed
    /// priority order (spec §4.1).
    #[must_use]
    pub fn new() -> Self {
        let mut parsers: Vec<Box<dyn FormatParser>> = vec![
            Box::new(JsonParser),
            Box::new(YamlParser),
            Box::new(TomlParser),
            Box::new(XmlParser),
            Box::new(CsvParser),
            Box::new(MarkdownParser),
            Box::new(CodeParser),
            Box::new(PlainTextParser),
        ];
        parsers.sort_by_key(|p| p.priority());
        Self { parsers }
    }

    /// Detect the format of `raw` and decode it, trying parsers in priority
    /// order. `hint`, when given, forces the matching parser's `can_parse`
    /// to return true (it may still fall through to the next candidate on
    /// parse failure); other parsers are unaffected by the hint and may
    /// still be tried if the hinted one fails.
    ///
    /// [`PlainTextParser`] is always last and always succeeds, so this
    /// never returns `None` in practice; the `Option` exists to make the
    /// "unreachable" FormatDetection error path in the orchestrator
    /// explicit rather than implicit.
    #[must_use]
    pub fn detect_and_normalize(&self, raw: &str, hint: Option<DataFormat>) -> Option<ParseOutcome> {
        for parser in &self.parsers {
            if parser.can_parse(raw, hint) {
                match parser.parse(raw) {
                    Ok(outcome) => return Some(outcome),
                    Err(_) => continue,
                }
            }
        }
        None
    }
}

/// Detect and normalize `raw` using the canonical built-in parser registry.
///
/// Convenience wrapper over [`ParserRegistry::new`] +
/// [`ParserRegistry::detect_and_normalize`] for callers that don't need to
/// hold onto a registry across calls.
#[must_use]
pub fn detect_and_normalize(raw: &str, hint: Option<DataFormat>) -> Option<ParseOutcome> {
    ParserRegistry::new().detect_and_normalize(raw, hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Normalized;

    #[test]
    fn dispatches_json_before_yaml() {
        let registry = ParserRegistry::new();
        let out = registry.detect_and_normalize(r#"{"a":1,"b":2}"#, None).unwrap();
        assert_eq!(out.format, DataFormat::Json);
    }

    #[test]
    fn dispatches_yaml_when_json_declines() {
        let registry = ParserRegistry::new();
        let out = registry
            .detect_and_normalize("title: Notes\nversion: 2\n", None)
            .unwrap();
        assert_eq!(out.format, DataFormat::Yaml);
    }

    #[test]
    fn falls_through_to_plaintext_for_unrecognized_input() {
        let registry = ParserRegistry::new();
        let out = registry
            .detect_and_normalize("just some ordinary prose with nothing special.", None)
            .unwrap();
        assert_eq!(out.format, DataFormat::PlainText);
        assert!(!out.is_structured);
    }

    #[test]
    fn hint_forces_attempt_but_falls_through_on_failure() {
        let registry = ParserRegistry::new();
        // Hinting JSON on non-JSON input: JSON is attempted and fails, so
        // dispatch proceeds through the remaining priority order and lands
        // on plain text.
        let out = registry
            .detect_and_normalize("definitely not json", Some(DataFormat::Json))
            .unwrap();
        assert_eq!(out.format, DataFormat::PlainText);
    }

    #[test]
    fn plaintext_always_succeeds_as_terminal() {
        let registry = ParserRegistry::new();
        let out = registry.detect_and_normalize("", None).unwrap();
        assert_eq!(out.format, DataFormat::PlainText);
        match out.normalized {
            Normalized::Unstructured { content, .. } => assert_eq!(content, ""),
            _ => panic!("expected unstructured"),
        }
    }

    #[test]
    fn csv_dispatches_before_markdown_and_code() {
        let registry = ParserRegistry::new();
        let out = registry.detect_and_normalize("a,b\n1,2\n3,4\n", None).unwrap();
        assert_eq!(out.format, DataFormat::Csv);
    }
}
