// SPDX-License-Identifier: MIT OR Apache-2.0
//! contex-parsers
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Format detection, parsing, and embedding-text normalization (C1/C2).
//!
//! Each [`FormatParser`] knows how to recognize and decode one wire format.
//! [`dispatch::detect_and_normalize`] tries them in fixed priority order and
//! falls back to plain text, which always succeeds. [`embedding_text::render`]
//! turns the resulting [`ParseOutcome`] into the single string fed to the
//! embedding client.

/// Fixed-priority parser registry and dispatch rule.
pub mod dispatch;
/// Embedding-text rendering rules (C2).
pub mod embedding_text;

mod code;
mod csv_parser;
mod json;
mod markdown;
mod plaintext;
mod toml_parser;
mod xml;
mod yaml;

use contex_core::DataFormat;
use serde_json::Value;
use std::collections::BTreeMap;

pub use dispatch::detect_and_normalize;
pub use embedding_text::render as render_embedding_text;

/// The decoded shape of a value after a parser has accepted it.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A structured mapping, e.g. the object produced by JSON/YAML/TOML/XML,
    /// or the `{records, schema, row_count, column_count}` bag from CSV.
    Structured(BTreeMap<String, Value>),
    /// Free text with a parser-specific metadata sidecar (headings, language
    /// classification, etc). Only `content` participates in embedding text.
    Unstructured {
        /// The text content the embedding is computed from.
        content: String,
        /// Parser-specific extras, exposed to callers but never embedded.
        metadata: Value,
    },
}

/// Result of successfully parsing raw input with one [`FormatParser`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// Format tag of the parser that produced this outcome.
    pub format: DataFormat,
    /// Whether `normalized` is [`Normalized::Structured`].
    pub is_structured: bool,
    /// The decoded value.
    pub normalized: Normalized,
}

/// Why a parser declined or failed to parse a given input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ParseFailure(pub String);

impl ParseFailure {
    /// Build a new failure with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A single format parser, sniffable and priority-ordered.
///
/// Implementations must be stateless and safe to share across threads; the
/// registry in [`dispatch`] holds one boxed instance of each.
pub trait FormatParser: Send + Sync {
    /// The format tag this parser produces on success.
    fn format(&self) -> DataFormat;

    /// Fixed dispatch priority; lower runs first. See [`dispatch`] for the
    /// canonical ordering.
    fn priority(&self) -> u16;

    /// Whether this parser should be tried for `raw`.
    ///
    /// `hint`, when present and equal to [`Self::format`], forces this to
    /// return `true` regardless of sniffing — the caller still falls through
    /// to the next candidate if [`Self::parse`] then fails.
    fn can_parse(&self, raw: &str, hint: Option<DataFormat>) -> bool;

    /// Attempt to decode `raw` into a [`ParseOutcome`].
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure`] when `raw` does not actually decode as this
    /// format, even though [`Self::can_parse`] returned `true`.
    fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseFailure>;
}
