// SPDX-License-Identifier: MIT OR Apache-2.0
//! CSV/TSV parser: priority 11.
//!
//! Dialect (delimiter) is sniffed from the first 1024 bytes; at least 70% of
//! sampled rows must share the modal column count and at least two columns
//! are required. Column types are inferred from the first 100 rows in the
//! order `int -> float -> bool -> string`.

use crate::{Normalized, ParseFailure, ParseOutcome};
use contex_core::DataFormat;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

const SNIFF_BYTES: usize = 1024;
const TYPE_SAMPLE_ROWS: usize = 100;
const MODAL_AGREEMENT_THRESHOLD: f64 = 0.70;
const CANDIDATE_DELIMITERS: &[u8] = b",\t;|";

const TRUE_WORDS: &[&str] = &["true", "yes", "1", "t", "y"];
const FALSE_WORDS: &[&str] = &["false", "no", "0", "f", "n"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Int,
    Float,
    Bool,
    String,
}

impl ColumnType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
        }
    }
}

fn sniff_delimiter(raw: &str) -> u8 {
    let sample = &raw.as_bytes()[..raw.len().min(SNIFF_BYTES)];
    let sample_str = String::from_utf8_lossy(sample);
    let first_lines: Vec<&str> = sample_str.lines().take(5).collect();

    let mut best = b',';
    let mut best_score = -1i64;
    for &delim in CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = first_lines
            .iter()
            .map(|line| line.bytes().filter(|&b| b == delim).count())
            .collect();
        if counts.is_empty() || counts.iter().any(|&c| c == 0) {
            continue;
        }
        let first = counts[0];
        if counts.iter().all(|&c| c == first) {
            let score = first as i64;
            if score > best_score {
                best_score = score;
                best = delim;
            }
        }
    }
    best
}

/// Reject input that looks like source code, markdown, or indented YAML
/// before committing to a CSV dialect sniff.
fn looks_non_csv(raw: &str) -> bool {
    let code_markers = ["fn ", "function ", "def ", "class ", "import ", "#include", "{", "};"];
    if code_markers.iter().any(|m| raw.contains(m)) {
        return true;
    }
    let markdown_markers = ["# ", "## ", "```", "](", "* "];
    if markdown_markers.iter().any(|m| raw.contains(m)) {
        return true;
    }
    // Indented YAML: a colon-bearing line followed by a more-indented line.
    let lines: Vec<&str> = raw.lines().collect();
    for i in 0..lines.len().saturating_sub(1) {
        let cur = lines[i];
        let next = lines[i + 1];
        let cur_trim = cur.trim_start();
        if cur_trim.ends_with(':') {
            let cur_indent = cur.len() - cur_trim.len();
            let next_trim = next.trim_start();
            if !next_trim.is_empty() && (next.len() - next_trim.len()) > cur_indent {
                return true;
            }
        }
    }
    false
}

fn infer_type(values: &[&str]) -> ColumnType {
    let sample: Vec<&&str> = values.iter().take(TYPE_SAMPLE_ROWS).collect();
    if sample.is_empty() {
        return ColumnType::String;
    }
    if sample.iter().all(|v| v.parse::<i64>().is_ok()) {
        return ColumnType::Int;
    }
    if sample.iter().all(|v| v.parse::<f64>().is_ok()) {
        return ColumnType::Float;
    }
    if sample
        .iter()
        .all(|v| {
            let lower = v.to_lowercase();
            TRUE_WORDS.contains(&lower.as_str()) || FALSE_WORDS.contains(&lower.as_str())
        })
    {
        return ColumnType::Bool;
    }
    ColumnType::String
}

fn typed_value(raw: &str, ty: ColumnType) -> JsonValue {
    match ty {
        ColumnType::Int => raw
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(raw.to_string())),
        ColumnType::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(raw.to_string())),
        ColumnType::Bool => {
            let lower = raw.to_lowercase();
            if TRUE_WORDS.contains(&lower.as_str()) {
                JsonValue::Bool(true)
            } else if FALSE_WORDS.contains(&lower.as_str()) {
                JsonValue::Bool(false)
            } else {
                JsonValue::String(raw.to_string())
            }
        }
        ColumnType::String => JsonValue::String(raw.to_string()),
    }
}

struct Sniffed {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn sniff_and_read(raw: &str) -> Option<Sniffed> {
    if looks_non_csv(raw) {
        return None;
    }
    let delimiter = sniff_delimiter(raw);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers: Vec<String> = reader.headers().ok()?.iter().map(str::to_string).collect();
    if headers.len() < 2 {
        return None;
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.ok()?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    if rows.is_empty() {
        return None;
    }

    let modal_len = headers.len();
    let agreeing = rows.iter().filter(|r| r.len() == modal_len).count();
    let ratio = agreeing as f64 / rows.len() as f64;
    if ratio < MODAL_AGREEMENT_THRESHOLD {
        return None;
    }
    rows.retain(|r| r.len() == modal_len);

    Some(Sniffed { headers, rows })
}

fn decode(raw: &str) -> Option<BTreeMap<String, JsonValue>> {
    let sniffed = sniff_and_read(raw)?;
    let Sniffed { headers, rows } = sniffed;

    let mut schema: BTreeMap<String, ColumnType> = BTreeMap::new();
    for (col_idx, header) in headers.iter().enumerate() {
        let column_values: Vec<&str> = rows.iter().map(|r| r[col_idx].as_str()).collect();
        schema.insert(header.clone(), infer_type(&column_values));
    }

    let records: Vec<JsonValue> = rows
        .iter()
        .map(|row| {
            let mut map = Map::new();
            for (col_idx, header) in headers.iter().enumerate() {
                let ty = schema[header];
                map.insert(header.clone(), typed_value(&row[col_idx], ty));
            }
            JsonValue::Object(map)
        })
        .collect();

    let schema_json: Map<String, JsonValue> = schema
        .iter()
        .map(|(k, v)| (k.clone(), JsonValue::String(v.as_str().to_string())))
        .collect();

    let mut out = BTreeMap::new();
    out.insert("records".to_string(), JsonValue::Array(records));
    out.insert("schema".to_string(), JsonValue::Object(schema_json));
    out.insert("row_count".to_string(), JsonValue::from(rows.len()));
    out.insert("column_count".to_string(), JsonValue::from(headers.len()));
    Some(out)
}

/// Parser for CSV/TSV documents (`format_name = "csv"`, priority 11).
#[derive(Debug, Default)]
pub struct CsvParser;

impl crate::FormatParser for CsvParser {
    fn format(&self) -> DataFormat {
        DataFormat::Csv
    }

    fn priority(&self) -> u16 {
        11
    }

    fn can_parse(&self, raw: &str, hint: Option<DataFormat>) -> bool {
        hint == Some(DataFormat::Csv) || decode(raw).is_some()
    }

    fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseFailure> {
        let map = decode(raw).ok_or_else(|| ParseFailure::new("not a recognizable CSV/TSV table"))?;
        Ok(ParseOutcome {
            format: DataFormat::Csv,
            is_structured: true,
            normalized: Normalized::Structured(map),
        })
    }
}
