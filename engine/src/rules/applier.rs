//! Built-in rule engine.

use rhai::{Dynamic, Engine, Scope};
use serde_json::{Map, Value};

use super::engine::RuleEngine;
use super::rule::{is_empty, parse_payload, RuleSource, ValueRule};
use crate::error::{RuleError, RuleResult};
use crate::path::{get_from_key, get_ref, value_to_key};

/// Evaluates [`ValueRule`] payloads.
///
/// Candidate rules are tried in order and the first non-empty result wins;
/// when none produces a value the result is null.
pub struct RuleApplier {
    engine: Engine,
}

impl std::fmt::Debug for RuleApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleApplier").finish_non_exhaustive()
    }
}

impl RuleApplier {
    pub fn new() -> Self {
        Self { engine: Self::create_engine() }
    }

    /// Script engine with limits, so a bad expression cannot run away.
    fn create_engine() -> Engine {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(100_000);
        engine.set_max_string_size(1_000_000);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);
        engine.set_max_call_levels(16);
        engine
    }

    /// Evaluate one candidate rule.
    pub fn evaluate(
        &self,
        rule: &ValueRule,
        record: &Value,
        output: &Value,
        extra: &Map<String, Value>,
    ) -> RuleResult<Value> {
        let mut value = match rule.source()? {
            RuleSource::Get(path) => get_from_key(record, path, Value::Null),
            RuleSource::Concat(paths) => {
                let parts: Vec<String> = paths
                    .iter()
                    .filter_map(|p| get_ref(record, p))
                    .map(value_to_key)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if parts.is_empty() {
                    Value::Null
                } else {
                    Value::String(parts.join(rule.separator.as_str()))
                }
            }
            RuleSource::Constant(value) => value.clone(),
            RuleSource::Expression(expression) => {
                self.eval_expression(expression, record, output, extra)?
            }
        };

        if is_empty(&value) {
            if let Some(default) = &rule.default {
                value = default.clone();
            }
        }

        for op in &rule.operations {
            value = op.apply(&value)?;
        }

        if is_empty(&value) {
            return Ok(rule.default.clone().unwrap_or(Value::Null));
        }
        Ok(value)
    }

    fn eval_expression(
        &self,
        expression: &str,
        record: &Value,
        output: &Value,
        extra: &Map<String, Value>,
    ) -> RuleResult<Value> {
        let failure = |message: String| RuleError::Expression {
            expression: expression.to_string(),
            message,
        };
        let to_dynamic = |value: &Value| {
            rhai::serde::to_dynamic(value).map_err(|e| failure(e.to_string()))
        };

        let mut scope = Scope::new();
        scope.push("record", to_dynamic(record)?);
        scope.push("context", to_dynamic(record.get("@context").unwrap_or(&Value::Null))?);
        scope.push("column", to_dynamic(record.get("@column").unwrap_or(&Value::Null))?);
        scope.push("output", to_dynamic(output)?);
        scope.push("extra", to_dynamic(&Value::Object(extra.clone()))?);

        let result: Dynamic = self
            .engine
            .eval_with_scope(&mut scope, expression)
            .map_err(|e| failure(e.to_string()))?;

        if result.is_unit() {
            return Ok(Value::Null);
        }
        rhai::serde::from_dynamic(&result).map_err(|e| failure(e.to_string()))
    }
}

impl Default for RuleApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine for RuleApplier {
    fn apply(
        &self,
        record: &Value,
        output: &Value,
        rules: &Value,
        extra: &Map<String, Value>,
    ) -> RuleResult<Value> {
        for rule in parse_payload(rules)? {
            let value = self.evaluate(&rule, record, output, extra)?;
            if !is_empty(&value) {
                return Ok(value);
            }
        }
        Ok(Value::Null)
    }

    fn name(&self) -> &str {
        "rule-applier"
    }
}
