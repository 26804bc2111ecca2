// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON parser: priority 0.

use crate::{Normalized, ParseFailure, ParseOutcome};
use contex_core::DataFormat;
use serde_json::Value;
use std::collections::BTreeMap;

/// Decode `raw` as JSON, accepting either a top-level object or a JSON
/// string that itself decodes to an object (double-encoded JSON).
fn decode(raw: &str) -> Option<BTreeMap<String, Value>> {
    let value: Value = serde_json::from_str(raw).ok()?;
    match value {
        Value::Object(map) => Some(map.into_iter().collect()),
        Value::String(inner) => {
            let nested: Value = serde_json::from_str(&inner).ok()?;
            match nested {
                Value::Object(map) => Some(map.into_iter().collect()),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Parser for JSON objects (`format_name = "json"`, priority 0).
#[derive(Debug, Default)]
pub struct JsonParser;

impl crate::FormatParser for JsonParser {
    fn format(&self) -> DataFormat {
        DataFormat::Json
    }

    fn priority(&self) -> u16 {
        0
    }

    fn can_parse(&self, raw: &str, hint: Option<DataFormat>) -> bool {
        hint == Some(DataFormat::Json) || decode(raw).is_some()
    }

    fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseFailure> {
        let map = decode(raw).ok_or_else(|| ParseFailure::new("not a JSON object"))?;
        Ok(ParseOutcome {
            format: DataFormat::Json,
            is_structured: true,
            normalized: Normalized::Structured(map),
        })
    }
}
