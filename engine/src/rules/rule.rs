//! Rule payloads understood by [`super::RuleApplier`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::operations::Operation;
use crate::error::{RuleError, RuleResult};

/// One candidate rule: a value source, operations, and a default.
///
/// Exactly one of `get`, `concat`, `constant` or `expression` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueRule {
    /// Path into the evaluation record (`@context.*`, `@column.*`, `@new.*`
    /// included).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<String>,

    /// Paths whose non-empty values are joined with `separator`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concat: Option<Vec<String>>,

    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<Value>,

    /// Rhai expression with `record`, `context`, `column`, `output` and
    /// `extra` in scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,

    /// Used when the result is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_separator() -> String {
    " ".to_string()
}

/// Borrowed view of the single source a rule reads from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleSource<'a> {
    Get(&'a str),
    Concat(&'a [String]),
    Constant(&'a Value),
    Expression(&'a str),
}

impl ValueRule {
    fn empty() -> Self {
        Self {
            get: None,
            concat: None,
            separator: default_separator(),
            constant: None,
            expression: None,
            operations: Vec::new(),
            default: None,
        }
    }

    pub fn from_get(path: &str) -> Self {
        Self { get: Some(path.to_string()), ..Self::empty() }
    }

    pub fn from_concat(paths: Vec<String>, separator: &str) -> Self {
        Self { concat: Some(paths), separator: separator.to_string(), ..Self::empty() }
    }

    pub fn from_constant(value: Value) -> Self {
        Self { constant: Some(value), ..Self::empty() }
    }

    pub fn from_expression(expression: &str) -> Self {
        Self { expression: Some(expression.to_string()), ..Self::empty() }
    }

    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// The rule's source, or an error unless exactly one is set.
    pub fn source(&self) -> RuleResult<RuleSource<'_>> {
        let mut sources = Vec::with_capacity(1);
        if let Some(path) = &self.get {
            sources.push(RuleSource::Get(path));
        }
        if let Some(paths) = &self.concat {
            sources.push(RuleSource::Concat(paths));
        }
        if let Some(value) = &self.constant {
            sources.push(RuleSource::Constant(value));
        }
        if let Some(expression) = &self.expression {
            sources.push(RuleSource::Expression(expression));
        }

        match sources.as_slice() {
            [single] => Ok(*single),
            [] => Err(RuleError::InvalidRule(
                "rule needs one of get, concat, constant or expression".to_string(),
            )),
            _ => Err(RuleError::InvalidRule(
                "rule sets more than one of get, concat, constant, expression".to_string(),
            )),
        }
    }
}

/// Decode a rule payload into its candidate rules.
///
/// Accepts a single rule object, a list of them, or a bare string as a
/// shorthand for `{"get": "<path>"}`.
pub fn parse_payload(payload: &Value) -> RuleResult<Vec<ValueRule>> {
    let rules = match payload {
        Value::String(path) => vec![ValueRule::from_get(path)],
        Value::Object(_) => vec![serde_json::from_value(payload.clone())?],
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(path) => Ok(ValueRule::from_get(path)),
                other => serde_json::from_value(other.clone()).map_err(RuleError::from),
            })
            .collect::<RuleResult<Vec<_>>>()?,
        other => {
            return Err(RuleError::InvalidRule(format!(
                "expected a rule object, a list of rules or a path, got {}",
                other
            )))
        }
    };

    for rule in &rules {
        rule.source()?;
    }
    Ok(rules)
}

/// Null, blank strings and empty structures count as empty.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
