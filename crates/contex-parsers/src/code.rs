// SPDX-License-Identifier: MIT OR Apache-2.0
//! Source code parser: priority 21.
//!
//! Detected by definition/import/decorator/access-modifier regexes.
//! Classified Python vs. JavaScript/TypeScript by keyword-count vote; within
//! the JS family, `interface ` or typed-colon annotations select
//! TypeScript. Unstructured: the raw source is the embedding content.

use crate::{Normalized, ParseFailure, ParseOutcome};
use contex_core::DataFormat;
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use std::sync::LazyLock;

static DEFINITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(def|function|class|fn|void|struct|interface)\s+\w").unwrap());
static IMPORT_STMT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(import|from|require|using|#include)\b").unwrap());
static DECORATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*@\w+").unwrap());
static ACCESS_MODIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(public|private|protected|static)\s").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Python,
    JavaScript,
    TypeScript,
    Generic,
}

impl Language {
    fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Generic => "generic",
        }
    }
}

const PYTHON_KEYWORDS: &[&str] = &["def ", "elif ", "self", "lambda ", "import ", "None", "True", "False", ":\n"];
const JS_KEYWORDS: &[&str] = &["function ", "const ", "let ", "=>", "require(", "export ", "var "];

static TYPE_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\s*(string|number|boolean|any|void|[A-Z]\w*)\b").unwrap());

fn classify_language(raw: &str) -> Language {
    let py_score: usize = PYTHON_KEYWORDS.iter().filter(|k| raw.contains(*k)).count();
    let js_score: usize = JS_KEYWORDS.iter().filter(|k| raw.contains(*k)).count();

    if py_score == 0 && js_score == 0 {
        return Language::Generic;
    }
    if py_score >= js_score {
        return Language::Python;
    }
    if raw.contains("interface ") || TYPE_ANNOTATION.is_match(raw) {
        Language::TypeScript
    } else {
        Language::JavaScript
    }
}

static PY_DEF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*def\s+(\w+)").unwrap());
static PY_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*class\s+(\w+)").unwrap());
static PY_IMPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*(?:import|from)\s+([\w.]+)").unwrap());
static PY_DECORATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*@(\w+)").unwrap());

static JS_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)|(?:const|let)\s+(\w+)\s*=\s*(?:async\s*)?\(").unwrap()
});
static JS_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*(?:export\s+)?class\s+(\w+)").unwrap());
static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s+.*?from\s+['"]([^'"]+)['"]"#).unwrap());
static JS_EXPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*export\s+(?:default\s+)?(?:const|function|class)\s+(\w+)").unwrap());
static TS_INTERFACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*(?:export\s+)?interface\s+(\w+)").unwrap());

fn extract_python(raw: &str) -> JsonValue {
    json!({
        "functions": PY_DEF.captures_iter(raw).map(|c| c[1].to_string()).collect::<Vec<_>>(),
        "classes": PY_CLASS.captures_iter(raw).map(|c| c[1].to_string()).collect::<Vec<_>>(),
        "imports": PY_IMPORT.captures_iter(raw).map(|c| c[1].to_string()).collect::<Vec<_>>(),
        "decorators": PY_DECORATOR.captures_iter(raw).map(|c| c[1].to_string()).collect::<Vec<_>>(),
    })
}

fn extract_js(raw: &str, is_typescript: bool) -> JsonValue {
    let functions: Vec<String> = JS_FUNCTION
        .captures_iter(raw)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_string()))
        .collect();
    let mut out = json!({
        "functions": functions,
        "classes": JS_CLASS.captures_iter(raw).map(|c| c[1].to_string()).collect::<Vec<_>>(),
        "imports": JS_IMPORT.captures_iter(raw).map(|c| c[1].to_string()).collect::<Vec<_>>(),
        "exports": JS_EXPORT.captures_iter(raw).map(|c| c[1].to_string()).collect::<Vec<_>>(),
    });
    if is_typescript {
        out["interfaces"] = json!(TS_INTERFACE.captures_iter(raw).map(|c| c[1].to_string()).collect::<Vec<_>>());
    }
    out
}

fn extract_generic(raw: &str) -> JsonValue {
    let lines: Vec<&str> = raw.lines().collect();
    let blank = lines.iter().filter(|l| l.trim().is_empty()).count();
    let total_len: usize = lines.iter().map(|l| l.len()).sum();
    let avg_len = if lines.is_empty() { 0.0 } else { total_len as f64 / lines.len() as f64 };
    json!({
        "line_count": lines.len(),
        "blank_line_count": blank,
        "avg_line_length": avg_len,
    })
}

/// Parser for source code (`format_name = "code"`, priority 21).
#[derive(Debug, Default)]
pub struct CodeParser;

impl crate::FormatParser for CodeParser {
    fn format(&self) -> DataFormat {
        DataFormat::Code
    }

    fn priority(&self) -> u16 {
        21
    }

    fn can_parse(&self, raw: &str, hint: Option<DataFormat>) -> bool {
        hint == Some(DataFormat::Code)
            || DEFINITION.is_match(raw)
            || IMPORT_STMT.is_match(raw)
            || DECORATOR.is_match(raw)
            || ACCESS_MODIFIER.is_match(raw)
    }

    fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseFailure> {
        let language = classify_language(raw);
        let extracted = match language {
            Language::Python => extract_python(raw),
            Language::JavaScript => extract_js(raw, false),
            Language::TypeScript => extract_js(raw, true),
            Language::Generic => extract_generic(raw),
        };

        let metadata = json!({
            "content_type": "code",
            "language": language.as_str(),
            "extracted": extracted,
        });

        Ok(ParseOutcome {
            format: DataFormat::Code,
            is_structured: false,
            normalized: Normalized::Unstructured {
                content: raw.to_string(),
                metadata,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FormatParser;

    #[test]
    fn detects_python_definitions() {
        let p = CodeParser;
        let raw = "import os\n\ndef greet(name):\n    return f'hi {name}'\n";
        assert!(p.can_parse(raw, None));
        let out = p.parse(raw).unwrap();
        match out.normalized {
            Normalized::Unstructured { metadata, .. } => {
                assert_eq!(metadata["language"], "python");
                assert_eq!(metadata["extracted"]["functions"][0], "greet");
            }
            _ => panic!("expected unstructured"),
        }
    }

    #[test]
    fn detects_python_class_and_decorator() {
        let p = CodeParser;
        let raw = "@dataclass\nclass Point:\n    x: int\n    y: int\n";
        let out = p.parse(raw).unwrap();
        match out.normalized {
            Normalized::Unstructured { metadata, .. } => {
                assert_eq!(metadata["language"], "python");
                assert_eq!(metadata["extracted"]["classes"][0], "Point");
                assert_eq!(metadata["extracted"]["decorators"][0], "dataclass");
            }
            _ => panic!("expected unstructured"),
        }
    }

    #[test]
    fn classifies_typescript_via_interface() {
        let p = CodeParser;
        let raw = "export interface User {\n  name: string;\n}\n\nfunction greet(u: User) {\n  return u.name;\n}\n";
        let out = p.parse(raw).unwrap();
        match out.normalized {
            Normalized::Unstructured { metadata, .. } => {
                assert_eq!(metadata["language"], "typescript");
                assert_eq!(metadata["extracted"]["interfaces"][0], "User");
            }
            _ => panic!("expected unstructured"),
        }
    }

    #[test]
    fn classifies_plain_javascript() {
        let p = CodeParser;
        let raw = "export function add(a, b) {\n  return a + b;\n}\n\nconst x = require('fs');\n";
        let out = p.parse(raw).unwrap();
        match out.normalized {
            Normalized::Unstructured { metadata, .. } => {
                assert_eq!(metadata["language"], "javascript");
            }
            _ => panic!("expected unstructured"),
        }
    }

    #[test]
    fn generic_fallback_has_line_stats() {
        let p = CodeParser;
        let raw = "public static void main() {\n}\n";
        let out = p.parse(raw).unwrap();
        match out.normalized {
            Normalized::Unstructured { metadata, .. } => {
                assert_eq!(metadata["language"], "generic");
                assert!(metadata["extracted"]["line_count"].as_u64().unwrap() >= 1);
            }
            _ => panic!("expected unstructured"),
        }
    }

    #[test]
    fn rejects_plain_prose() {
        let p = CodeParser;
        assert!(!p.can_parse("This is a plain English paragraph with no code.", None));
    }
}
