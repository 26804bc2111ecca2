// SPDX-License-Identifier: MIT OR Apache-2.0
//! TOML parser: priority 2.

use crate::{Normalized, ParseFailure, ParseOutcome};
use contex_core::DataFormat;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

fn decode(raw: &str) -> Option<BTreeMap<String, JsonValue>> {
    let value: toml::Value = toml::from_str(raw).ok()?;
    let json: JsonValue = serde_json::to_value(&value).ok()?;
    match json {
        JsonValue::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}

/// Parser for TOML documents (`format_name = "toml"`, priority 2).
#[derive(Debug, Default)]
pub struct TomlParser;

impl crate::FormatParser for TomlParser {
    fn format(&self) -> DataFormat {
        DataFormat::Toml
    }

    fn priority(&self) -> u16 {
        2
    }

    fn can_parse(&self, raw: &str, hint: Option<DataFormat>) -> bool {
        hint == Some(DataFormat::Toml) || decode(raw).is_some()
    }

    fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseFailure> {
        let map = decode(raw).ok_or_else(|| ParseFailure::new("not a valid TOML document"))?;
        Ok(ParseOutcome {
            format: DataFormat::Toml,
            is_structured: true,
            normalized: Normalized::Structured(map),
        })
    }
}
