//! Value operations applied after a rule has produced its raw value.
//!
//! Text operations work on strings, numbers and booleans; applied to a
//! sequence they run on every element. Other shapes pass through untouched.

use chrono::format::{Item as FormatItem, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{RuleError, RuleResult};

/// All available value operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Trim,
    Uppercase,
    Lowercase,

    /// Regex replacement.
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    PadStart {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    PadEnd {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    EnsurePrefix { value: String },

    EnsureSuffix { value: String },

    /// Lookup table. Case-insensitive lookups take the first key in sorted order.
    Map {
        mapping: BTreeMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Replacement when nothing matches; `None` keeps the input.
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// String to sequence.
    Split {
        #[serde(default = "default_separator")]
        separator: String,
    },

    /// Sequence to string; empty and null elements are skipped.
    Join {
        #[serde(default = "default_separator")]
        separator: String,
    },

    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Integer when possible, float otherwise, null when not numeric.
    ToNumber,

    /// Characters from `start`, optionally limited to `length`.
    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },

    DigitsOnly,

    /// Re-format a date or date-time; null when the input does not parse.
    DateFormat {
        /// strftime input format; RFC 3339 and `%Y-%m-%d` are tried when absent.
        #[serde(default)]
        from: Option<String>,
        to: String,
    },
}

fn default_pad_char() -> String {
    "0".to_string()
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_true_values() -> Vec<String> {
    ["true", "1", "yes", "y", "on"].iter().map(|s| s.to_string()).collect()
}

impl Operation {
    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Trim => "trim",
            Operation::Uppercase => "uppercase",
            Operation::Lowercase => "lowercase",
            Operation::Replace { .. } => "replace",
            Operation::PadStart { .. } => "pad_start",
            Operation::PadEnd { .. } => "pad_end",
            Operation::EnsurePrefix { .. } => "ensure_prefix",
            Operation::EnsureSuffix { .. } => "ensure_suffix",
            Operation::Map { .. } => "map",
            Operation::Split { .. } => "split",
            Operation::Join { .. } => "join",
            Operation::ToBoolean { .. } => "to_boolean",
            Operation::ToNumber => "to_number",
            Operation::Substring { .. } => "substring",
            Operation::DigitsOnly => "digits_only",
            Operation::DateFormat { .. } => "date_format",
        }
    }

    /// Apply this operation to a value.
    pub fn apply(&self, value: &Value) -> RuleResult<Value> {
        match self {
            Operation::Trim => Ok(map_text(value, &|s: &str| s.trim().to_string())),
            Operation::Uppercase => Ok(map_text(value, &|s: &str| s.to_uppercase())),
            Operation::Lowercase => Ok(map_text(value, &|s: &str| s.to_lowercase())),
            Operation::Replace { pattern, value: replacement } => {
                let re = regex::Regex::new(pattern).map_err(|e| self.failure(e))?;
                Ok(map_text(value, &|s: &str| re.replace_all(s, replacement.as_str()).into_owned()))
            }
            Operation::PadStart { length, char } => {
                let pad = pad_char(char);
                Ok(map_text(value, &|s: &str| {
                    let missing = length.saturating_sub(s.chars().count());
                    format!("{}{}", pad.to_string().repeat(missing), s)
                }))
            }
            Operation::PadEnd { length, char } => {
                let pad = pad_char(char);
                Ok(map_text(value, &|s: &str| {
                    let missing = length.saturating_sub(s.chars().count());
                    format!("{}{}", s, pad.to_string().repeat(missing))
                }))
            }
            Operation::EnsurePrefix { value: prefix } => Ok(map_text(value, &|s: &str| {
                if s.starts_with(prefix.as_str()) {
                    s.to_string()
                } else {
                    format!("{}{}", prefix, s)
                }
            })),
            Operation::EnsureSuffix { value: suffix } => Ok(map_text(value, &|s: &str| {
                if s.ends_with(suffix.as_str()) {
                    s.to_string()
                } else {
                    format!("{}{}", s, suffix)
                }
            })),
            Operation::Map { mapping, case_insensitive, default_unmapped } => {
                Ok(map_text(value, &|s: &str| {
                    let found = if *case_insensitive {
                        let lower = s.to_lowercase();
                        mapping.iter().find(|(k, _)| k.to_lowercase() == lower).map(|(_, v)| v)
                    } else {
                        mapping.get(s)
                    };
                    match (found, default_unmapped) {
                        (Some(mapped), _) => mapped.clone(),
                        (None, Some(fallback)) => fallback.clone(),
                        (None, None) => s.to_string(),
                    }
                }))
            }
            Operation::Split { separator } => Ok(match as_text(value) {
                Some(s) if !separator.is_empty() => Value::Array(
                    s.split(separator.as_str())
                        .map(|part| Value::String(part.trim().to_string()))
                        .collect(),
                ),
                _ => value.clone(),
            }),
            Operation::Join { separator } => Ok(match value {
                Value::Array(items) => Value::String(
                    items
                        .iter()
                        .filter_map(as_text)
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                        .join(separator.as_str()),
                ),
                other => other.clone(),
            }),
            Operation::ToBoolean { true_values } => Ok(to_boolean(value, true_values)),
            Operation::ToNumber => Ok(to_number(value)),
            Operation::Substring { start, length } => Ok(map_text(value, &|s: &str| {
                let chars = s.chars().skip(*start);
                match length {
                    Some(len) => chars.take(*len).collect(),
                    None => chars.collect(),
                }
            })),
            Operation::DigitsOnly => {
                Ok(map_text(value, &|s: &str| s.chars().filter(|c| c.is_ascii_digit()).collect()))
            }
            Operation::DateFormat { from, to } => {
                if StrftimeItems::new(to).any(|item| matches!(item, FormatItem::Error)) {
                    return Err(self.failure(format!("invalid output format '{}'", to)));
                }
                Ok(match as_text(value) {
                    Some(s) => parse_date(s.trim(), from.as_deref())
                        .map(|dt| Value::String(dt.format(to).to_string()))
                        .unwrap_or(Value::Null),
                    None => value.clone(),
                })
            }
        }
    }

    fn failure(&self, message: impl ToString) -> RuleError {
        RuleError::Operation {
            operation: self.name().to_string(),
            message: message.to_string(),
        }
    }
}

/// Text form of a scalar; `None` for null and structures.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn map_text(value: &Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| map_text(v, f)).collect()),
        other => as_text(other).map(|s| Value::String(f(&s))).unwrap_or_else(|| other.clone()),
    }
}

fn pad_char(raw: &str) -> char {
    raw.chars().next().unwrap_or('0')
}

fn to_boolean(value: &Value, true_values: &[String]) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        Value::Array(items) => Value::Array(items.iter().map(|v| to_boolean(v, true_values)).collect()),
        other => {
            let truthy = as_text(other)
                .map(|s| {
                    let lower = s.trim().to_lowercase();
                    true_values.iter().any(|tv| tv.to_lowercase() == lower)
                })
                .unwrap_or(false);
            Value::Bool(truthy)
        }
    }
}

fn to_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::Array(items) => Value::Array(items.iter().map(to_number).collect()),
        other => as_text(other)
            .and_then(|s| {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    return Some(Value::from(i));
                }
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            })
            .unwrap_or(Value::Null),
    }
}

fn parse_date(raw: &str, from: Option<&str>) -> Option<NaiveDateTime> {
    match from {
        Some(format) => NaiveDateTime::parse_from_str(raw, format).ok().or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }),
        None => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.naive_utc())
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }),
    }
}

/// Reference of the operations, for the CLI.
pub fn operations_description() -> String {
    r#"Value operations (applied in order after the rule source):

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| replace | Regex replacement | pattern, value |
| pad_start | Pad at start | length, char (default "0") |
| pad_end | Pad at end | length, char (default "0") |
| ensure_prefix | Add prefix if missing | value |
| ensure_suffix | Add suffix if missing | value |
| map | Lookup table | mapping, case_insensitive, default_unmapped |
| split | String to list | separator (default ",") |
| join | List to string | separator (default ",") |
| to_boolean | Truthy strings to bool | true_values |
| to_number | Integer or float, null if not numeric | - |
| substring | Character slice | start, length |
| digits_only | Keep ASCII digits | - |
| date_format | Re-format a date | from (optional), to |

Rule sources (exactly one per rule): get, concat (+ separator), constant, expression.
A rule may also set "default", used when the result is empty.
A list of rules is tried in order; the first non-empty result wins.

Example:
{"get": "order.created_at", "operations": [{"type": "date_format", "to": "%Y"}, {"type": "to_number"}]}"#
        .to_string()
}
