//! Variable resolution and destination expansion.
//!
//! A template variable bound to a sequence fans the destination out: with
//! `{country}` resolving to `["FR", "DE"]`, `sales.{country}` becomes
//! `sales.FR` and `sales.DE`. Several multi-valued variables expand to their
//! cartesian product, the first declared variable varying slowest.
//!
//! The cost is the product of the sequence lengths. Expansion is meant for
//! controlled fan-out (one list field becoming N output columns), not for
//! arbitrary cardinalities.

use serde_json::{Map, Value};

use super::template::ColumnTemplate;
use crate::path::get_from_key;

/// A variable and the value it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableValue {
    pub variable: String,
    pub value: Value,
}

/// One concrete destination and the bindings that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub destination: String,
    pub bindings: Map<String, Value>,
}

/// Resolve every template variable against `record`.
///
/// Variables are paths; a path that does not resolve yields an empty string.
/// The caller exposes already computed output under a reserved key of
/// `record` when variables may refer to it.
pub fn resolve_variables(template: &ColumnTemplate, record: &Value) -> Vec<VariableValue> {
    template
        .variables()
        .iter()
        .map(|variable| VariableValue {
            variable: variable.clone(),
            value: get_from_key(record, variable, Value::String(String::new())),
        })
        .collect()
}

/// Every binding assignment implied by `values`, in enumeration order.
///
/// Sequences fan out per element and mappings per value; anything else binds
/// as is. An empty sequence leaves no assignment at all.
pub fn expand_bindings(values: &[VariableValue]) -> Vec<Map<String, Value>> {
    values.iter().fold(vec![Map::new()], |assignments, current| {
        let choices: Vec<&Value> = match &current.value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => map.values().collect(),
            scalar => vec![scalar],
        };

        assignments
            .iter()
            .flat_map(|partial| {
                choices.iter().map(move |choice| {
                    let mut next = partial.clone();
                    next.insert(current.variable.clone(), (*choice).clone());
                    next
                })
            })
            .collect()
    })
}

/// Concrete destinations for `template` given resolved variable values.
pub fn expand(template: &ColumnTemplate, values: &[VariableValue]) -> Vec<Expansion> {
    expand_bindings(values)
        .into_iter()
        .map(|bindings| Expansion {
            destination: template.render(&bindings),
            bindings,
        })
        .collect()
}
