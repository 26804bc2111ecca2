// SPDX-License-Identifier: MIT OR Apache-2.0
//! XML parser: priority 10.
//!
//! Converts an XML document into the normalized mapping shape: each element
//! tag becomes a key, attributes are nested under the literal key
//! `@attributes`, text content under `@text`, repeated child tags collapse
//! into an ordered list, and a leaf element with only text collapses to
//! that text string directly.

use crate::{Normalized, ParseFailure, ParseOutcome};
use contex_core::DataFormat;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// One parsed XML element: its attributes, child elements (in document
/// order, keyed by tag), and accumulated text content.
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

fn parse_element(reader: &mut Reader<&[u8]>, start_tag: String, attrs: Vec<(String, String)>) -> Result<Element, String> {
    let mut el = Element {
        tag: start_tag,
        attributes: attrs,
        children: Vec::new(),
        text: String::new(),
    };
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = read_attrs(&e);
                let child = parse_element(reader, tag, attrs)?;
                el.children.push(child);
            }
            Ok(Event::Empty(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = read_attrs(&e);
                el.children.push(Element {
                    tag,
                    attributes: attrs,
                    children: Vec::new(),
                    text: String::new(),
                });
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                el.text.push_str(text.trim());
            }
            Ok(Event::CData(t)) => {
                el.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Ok(Event::End(_)) => return Ok(el),
            Ok(Event::Eof) => return Ok(el),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
        buf.clear();
    }
}

fn read_attrs(e: &quick_xml::events::BytesStart) -> Vec<(String, String)> {
    e.attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = a.unescape_value().unwrap_or_default().into_owned();
            (key, value)
        })
        .collect()
}

/// Convert a parsed [`Element`] into its `JsonValue` representation,
/// applying the leaf-text collapse rule.
fn element_to_value(el: &Element) -> JsonValue {
    if el.children.is_empty() && el.attributes.is_empty() {
        return JsonValue::String(el.text.clone());
    }

    let mut map = Map::new();
    if !el.attributes.is_empty() {
        let attrs: Map<String, JsonValue> = el
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
            .collect();
        map.insert("@attributes".to_string(), JsonValue::Object(attrs));
    }
    if !el.text.trim().is_empty() {
        map.insert("@text".to_string(), JsonValue::String(el.text.clone()));
    }

    // Group children by tag, preserving first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut grouped: BTreeMap<String, Vec<JsonValue>> = BTreeMap::new();
    for child in &el.children {
        if !grouped.contains_key(&child.tag) {
            order.push(child.tag.clone());
        }
        grouped.entry(child.tag.clone()).or_default().push(element_to_value(child));
    }
    for tag in order {
        let mut values = grouped.remove(&tag).unwrap_or_default();
        if values.len() == 1 {
            map.insert(tag, values.remove(0));
        } else {
            map.insert(tag, JsonValue::Array(values));
        }
    }

    JsonValue::Object(map)
}

fn decode(raw: &str) -> Option<BTreeMap<String, JsonValue>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('<') || !trimmed.ends_with('>') {
        return None;
    }
    let mut reader = Reader::from_str(trimmed);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = read_attrs(&e);
                let root = parse_element(&mut reader, tag.clone(), attrs).ok()?;
                let value = element_to_value(&root);
                let mut out = BTreeMap::new();
                out.insert(tag, value);
                return Some(out);
            }
            Ok(Event::Empty(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = read_attrs(&e);
                let el = Element {
                    tag: tag.clone(),
                    attributes: attrs,
                    children: Vec::new(),
                    text: String::new(),
                };
                let mut out = BTreeMap::new();
                out.insert(tag, element_to_value(&el));
                return Some(out);
            }
            Ok(Event::Eof) => return None,
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::PI(_)) => {}
            Ok(_) => return None,
            Err(_) => return None,
        }
        buf.clear();
    }
}

/// Parser for XML documents (`format_name = "xml"`, priority 10).
#[derive(Debug, Default)]
pub struct XmlParser;

impl crate::FormatParser for XmlParser {
    fn format(&self) -> DataFormat {
        DataFormat::Xml
    }

    fn priority(&self) -> u16 {
        10
    }

    fn can_parse(&self, raw: &str, hint: Option<DataFormat>) -> bool {
        if hint == Some(DataFormat::Xml) {
            return true;
        }
        let trimmed = raw.trim();
        trimmed.starts_with('<') && trimmed.ends_with('>') && decode(raw).is_some()
    }

    fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseFailure> {
        let map = decode(raw).ok_or_else(|| ParseFailure::new("not a well-formed XML document"))?;
        Ok(ParseOutcome {
            format: DataFormat::Xml,
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
    fn leaf_element_collapses_to_text() {
        let p = XmlParser;
        let raw = "<name>Ada Lovelace</name>";
        let out = p.parse(raw).unwrap();
        match out.normalized {
            Normalized::Structured(m) => {
                assert_eq!(m["name"], JsonValue::String("Ada Lovelace".into()));
            }
            _ => panic!("expected structured"),
        }
    }

    #[test]
    fn attributes_nest_under_reserved_key() {
        let p = XmlParser;
        let raw = r#"<person id="42">Ada</person>"#;
        let out = p.parse(raw).unwrap();
        match out.normalized {
            Normalized::Structured(m) => {
                let person = &m["person"];
                assert_eq!(person["@attributes"]["id"], JsonValue::String("42".into()));
                assert_eq!(person["@text"], JsonValue::String("Ada".into()));
            }
            _ => panic!("expected structured"),
        }
    }

    #[test]
    fn repeated_child_tags_collapse_into_list() {
        let p = XmlParser;
        let raw = "<items><item>a</item><item>b</item><item>c</item></items>";
        let out = p.parse(raw).unwrap();
        match out.normalized {
            Normalized::Structured(m) => {
                let items = m["items"]["item"].as_array().unwrap();
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], JsonValue::String("a".into()));
            }
            _ => panic!("expected structured"),
        }
    }

    #[test]
    fn single_child_tag_does_not_collapse_into_list() {
        let p = XmlParser;
        let raw = "<root><only>x</only></root>";
        let out = p.parse(raw).unwrap();
        match out.normalized {
            Normalized::Structured(m) => {
                assert_eq!(m["root"]["only"], JsonValue::String("x".into()));
            }
            _ => panic!("expected structured"),
        }
    }

    #[test]
    fn rejects_non_xml() {
        let p = XmlParser;
        assert!(!p.can_parse("not xml at all", None));
        assert!(!p.can_parse("{\"a\":1}", None));
    }

    #[test]
    fn rejects_input_not_ending_in_angle_bracket() {
        let p = XmlParser;
        assert!(!p.can_parse("<root>text</root> trailing", None));
    }
}
