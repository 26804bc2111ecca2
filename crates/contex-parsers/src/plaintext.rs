// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plain-text parser: priority 100, the guaranteed terminal fallback.

use crate::{Normalized, ParseFailure, ParseOutcome};
use contex_core::DataFormat;
use serde_json::json;

/// Parser that always succeeds (`format_name = "plain_text"`, priority 100).
#[derive(Debug, Default)]
pub struct PlainTextParser;

impl crate::FormatParser for PlainTextParser {
    fn format(&self) -> DataFormat {
        DataFormat::PlainText
    }

    fn priority(&self) -> u16 {
        100
    }

    fn can_parse(&self, _raw: &str, _hint: Option<DataFormat>) -> bool {
        true
    }

    fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseFailure> {
        Ok(ParseOutcome {
            format: DataFormat::PlainText,
            is_structured: false,
            normalized: Normalized::Unstructured {
                content: raw.to_string(),
                metadata: json!({"content_type": "text"}),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FormatParser;

    #[test]
    fn always_succeeds() {
        let p = PlainTextParser;
        assert!(p.can_parse("anything at all", None));
        assert!(p.can_parse("", None));
        let out = p.parse("hello world").unwrap();
        match out.normalized {
            Normalized::Unstructured { content, metadata } => {
                assert_eq!(content, "hello world");
                assert_eq!(metadata["content_type"], "text");
            }
            _ => panic!("expected unstructured"),
        }
    }
}
