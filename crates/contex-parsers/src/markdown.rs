// SPDX-License-Identifier: MIT OR Apache-2.0
//! Markdown parser: priority 20.
//!
//! Unstructured: the embedding text is driven by `content` alone, but the
//! parsed `structure` sidecar (headings, links, code blocks, lists) rides
//! along for callers that want it.

use crate::{Normalized, ParseFailure, ParseOutcome};
use contex_core::DataFormat;
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use std::sync::LazyLock;

static ATX_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").unwrap());
static BOLD_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*\*[^*]+\*\*|__[^_]+__|\*[^*]+\*|_[^_]+_)").unwrap());
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]+)\)").unwrap());
static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```([A-Za-z0-9_+-]*)\n(.*?)```").unwrap());
static UNORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*[-*+]\s+.+$").unwrap());
static ORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s+.+$").unwrap());

const SUMMARY_MAX_CHARS: usize = 200;
const TITLE_FALLBACK_CHARS: usize = 100;

fn looks_like_markdown(raw: &str) -> bool {
    ATX_HEADING.is_match(raw)
        || BOLD_ITALIC.is_match(raw)
        || LINK.is_match(raw)
        || FENCE.is_match(raw)
        || UNORDERED_ITEM.is_match(raw)
        || ORDERED_ITEM.is_match(raw)
}

struct Heading {
    level: usize,
    text: String,
}

fn extract_headings(raw: &str) -> Vec<Heading> {
    ATX_HEADING
        .captures_iter(raw)
        .map(|c| Heading {
            level: c[1].len(),
            text: c[2].trim().to_string(),
        })
        .collect()
}

fn extract_links(raw: &str) -> Vec<(String, String)> {
    LINK.captures_iter(raw)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

fn extract_code_blocks(raw: &str) -> Vec<(String, String)> {
    FENCE
        .captures_iter(raw)
        .map(|c| (c[1].to_string(), c[2].trim_end().to_string()))
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn first_paragraph_excluding_headings(raw: &str) -> Option<String> {
    for block in raw.split("\n\n") {
        let trimmed = block.trim();
        if trimmed.is_empty() || ATX_HEADING.is_match(trimmed) {
            continue;
        }
        return Some(truncate_chars(trimmed, SUMMARY_MAX_CHARS));
    }
    None
}

fn derive_title(raw: &str, headings: &[Heading]) -> String {
    if let Some(h) = headings.first() {
        return h.text.clone();
    }
    let first_line = raw.lines().next().unwrap_or_default();
    truncate_chars(first_line.trim(), TITLE_FALLBACK_CHARS)
}

/// Parser for Markdown documents (`format_name = "markdown"`, priority 20).
#[derive(Debug, Default)]
pub struct MarkdownParser;

impl crate::FormatParser for MarkdownParser {
    fn format(&self) -> DataFormat {
        DataFormat::Markdown
    }

    fn priority(&self) -> u16 {
        20
    }

    fn can_parse(&self, raw: &str, hint: Option<DataFormat>) -> bool {
        hint == Some(DataFormat::Markdown) || looks_like_markdown(raw)
    }

    fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseFailure> {
        let headings = extract_headings(raw);
        let links = extract_links(raw);
        let code_blocks = extract_code_blocks(raw);
        let unordered_count = UNORDERED_ITEM.find_iter(raw).count();
        let ordered_count = ORDERED_ITEM.find_iter(raw).count();

        let title = derive_title(raw, &headings);
        let summary = first_paragraph_excluding_headings(raw).unwrap_or_default();

        let structure = json!({
            "headings": headings.iter().map(|h| json!({"level": h.level, "text": h.text})).collect::<Vec<_>>(),
            "links": links.iter().map(|(text, url)| json!({"text": text, "url": url})).collect::<Vec<_>>(),
            "code_blocks": code_blocks.iter().map(|(lang, code)| json!({"language": lang, "code": code})).collect::<Vec<_>>(),
            "lists": {"unordered": unordered_count, "ordered": ordered_count},
        });

        let metadata: JsonValue = json!({
            "content_type": "markdown",
            "structure": structure,
            "title": title,
            "summary": summary,
            "heading_count": headings.len(),
            "link_count": links.len(),
            "code_block_count": code_blocks.len(),
        });

        Ok(ParseOutcome {
            format: DataFormat::Markdown,
            is_structured: false,
            normalized: Normalized::Unstructured {
                content: raw.to_string(),
                metadata,
            },
        })
    }
}
