//! Destination field templates.
//!
//! A template such as `orders.{country}.{year}.total` names the field a rule
//! writes to. Each `{name}` placeholder is a path resolved against the record
//! being transformed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::path::value_to_key;

/// A placeholder: one `{` ... `}` pair around a run without braces.
static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid placeholder pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed destination template.
///
/// Parsing happens once, when the owning operation is built; afterwards the
/// template is read-only and can be shared between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTemplate {
    raw: String,
    segments: Vec<Segment>,
    variables: Vec<String>,
}

impl ColumnTemplate {
    /// Parse a template.
    ///
    /// Unbalanced braces never fail: the unmatched part stays literal text.
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut variables: Vec<String> = Vec::new();
        let mut last = 0;

        for caps in VARIABLE_PATTERN.captures_iter(raw) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(raw[last..whole.start()].to_string()));
            }
            let name = name.as_str().to_string();
            if !variables.contains(&name) {
                variables.push(name.clone());
            }
            segments.push(Segment::Variable(name));
            last = whole.end();
        }
        if last < raw.len() {
            segments.push(Segment::Literal(raw[last..].to_string()));
        }

        Self { raw: raw.to_string(), segments, variables }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Variable names in order of first appearance, each listed once.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn has_variables(&self) -> bool {
        !self.variables.is_empty()
    }

    /// Whether literal text still holds a brace, i.e. the template was
    /// malformed and some placeholder was not recognised.
    pub fn has_stray_braces(&self) -> bool {
        self.segments.iter().any(|s| match s {
            Segment::Literal(text) => text.contains('{') || text.contains('}'),
            Segment::Variable(_) => false,
        })
    }

    /// Substitute bound values into the placeholders.
    ///
    /// Works on the parsed segments, so a value that itself looks like a
    /// placeholder is written verbatim. Unbound variables render empty.
    pub fn render(&self, bindings: &Map<String, Value>) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    if let Some(value) = bindings.get(name) {
                        out.push_str(&value_to_key(value));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_variables_in_order() {
        let template = ColumnTemplate::parse("orders.{country}.{year}.total");
        assert_eq!(template.variables(), ["country", "year"]);
        assert!(!template.has_stray_braces());
    }

    #[test]
    fn test_no_variables() {
        let template = ColumnTemplate::parse("customer.name");
        assert!(template.variables().is_empty());
        assert_eq!(template.render(&Map::new()), "customer.name");
    }

    #[test]
    fn test_repeated_variable_listed_once() {
        let template = ColumnTemplate::parse("{a}.{b}.{a}");
        assert_eq!(template.variables(), ["a", "b"]);
        assert_eq!(template.render(&bindings(json!({"a": "x", "b": 1}))), "x.1.x");
    }

    #[test]
    fn test_unbalanced_braces_are_permissive() {
        let template = ColumnTemplate::parse("a.{open.{b}");
        assert_eq!(template.variables(), ["b"]);
        assert!(template.has_stray_braces());
        assert_eq!(template.render(&bindings(json!({"b": "B"}))), "a.{open.B");

        let template = ColumnTemplate::parse("a.{}.c}");
        assert!(template.variables().is_empty());
        assert!(template.has_stray_braces());
    }

    #[test]
    fn test_nested_path_variable() {
        let template = ColumnTemplate::parse("by_city.{address.city}");
        assert_eq!(template.variables(), ["address.city"]);
    }

    #[test]
    fn test_render_does_not_reparse_values() {
        let template = ColumnTemplate::parse("{a}.{b}");
        let out = template.render(&bindings(json!({"a": "{b}", "b": "B"})));
        assert_eq!(out, "{b}.B");
    }
}
