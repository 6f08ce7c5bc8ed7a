//! The rule transform operation.
//!
//! For every configured rule, in declaration order:
//!
//! 1. expose the merged context under `@context`;
//! 2. resolve the destination template's variables (the output built so far
//!    is visible under `@new`);
//! 3. expand to concrete destinations;
//! 4. per destination, bind `@column`, ask the rule engine for a value and
//!    write it at the destination path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::expander::{expand, resolve_variables};
use super::template::ColumnTemplate;
use crate::chain::ChainOperation;
use crate::context::ExecutionContext;
use crate::error::{ConfigResult, OperationResult, TransformError, TransformResult};
use crate::item::Item;
use crate::logs::log_warning;
use crate::path::set_from_key;
use crate::rules::RuleEngine;

/// Reserved key holding the pipeline parameters merged with the rule context.
pub const CONTEXT_KEY: &str = "@context";
/// Reserved key holding the variable bindings of the current destination.
pub const COLUMN_KEY: &str = "@column";
/// Reserved key holding the output record built so far.
pub const NEW_KEY: &str = "@new";

/// Configuration entry for one destination template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry {
    /// Payload handed to the rule engine as is.
    pub rules: Value,
    /// Parameters visible to this rule only, overriding the run context.
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Options of the `rule-transform` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleTransformConfig {
    /// Destination template → rule entry, in declaration order.
    pub rules: Map<String, Value>,
    #[serde(default)]
    pub add: bool,
}

impl RuleTransformConfig {
    /// Decode every entry, keeping declaration order.
    pub fn definitions(&self) -> ConfigResult<Vec<RuleDefinition>> {
        self.rules
            .iter()
            .map(|(template, entry)| {
                let entry: RuleEntry = serde_json::from_value(entry.clone())?;
                Ok(RuleDefinition::from_entry(template, entry))
            })
            .collect()
    }
}

/// A destination template with its rule payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    template: ColumnTemplate,
    context: Map<String, Value>,
    rules: Value,
}

impl RuleDefinition {
    pub fn new(template: &str, rules: Value) -> Self {
        Self {
            template: ColumnTemplate::parse(template),
            context: Map::new(),
            rules,
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn from_entry(template: &str, entry: RuleEntry) -> Self {
        Self::new(template, entry.rules).with_context(entry.context)
    }

    pub fn template(&self) -> &ColumnTemplate {
        &self.template
    }

    pub fn rules(&self) -> &Value {
        &self.rules
    }
}

/// Where the output record starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// Start from a copy of the input: untouched fields pass through.
    Additive,
    /// Start empty: only ruled fields appear.
    Exclusive,
}

impl TransformMode {
    pub fn from_add_flag(add: bool) -> Self {
        if add {
            TransformMode::Additive
        } else {
            TransformMode::Exclusive
        }
    }
}

/// Rule-driven transform of one record into a new record.
///
/// Templates are parsed when the operation is built, so the operation is
/// read-only afterwards and can be shared between workers.
pub struct RuleTransformOperation {
    engine: Arc<dyn RuleEngine>,
    rules: Vec<RuleDefinition>,
    mode: TransformMode,
}

impl std::fmt::Debug for RuleTransformOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleTransformOperation")
            .field("engine", &self.engine.name())
            .field("rules", &self.rules)
            .field("mode", &self.mode)
            .finish()
    }
}

impl RuleTransformOperation {
    pub fn new(engine: Arc<dyn RuleEngine>, rules: Vec<RuleDefinition>, mode: TransformMode) -> Self {
        for rule in &rules {
            if rule.template.has_stray_braces() {
                log_warning(format!(
                    "Template '{}' has unbalanced braces; unmatched text is kept literally",
                    rule.template.raw()
                ));
            }
        }
        Self { engine, rules, mode }
    }

    pub fn from_config(engine: Arc<dyn RuleEngine>, config: &RuleTransformConfig) -> ConfigResult<Self> {
        Ok(Self::new(engine, config.definitions()?, TransformMode::from_add_flag(config.add)))
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    /// Transform one record. The input is never modified.
    ///
    /// Records are expected to be mappings; anything else is evaluated as an
    /// empty mapping. Any rule engine failure aborts the whole record.
    pub fn transform(&self, record: &Value, context: &ExecutionContext) -> TransformResult<Value> {
        let fields = match record {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let mut output = match self.mode {
            TransformMode::Additive => Value::Object(fields.clone()),
            TransformMode::Exclusive => Value::Object(Map::new()),
        };
        let mut data = Value::Object(fields);
        let extra = Map::new();

        for rule in &self.rules {
            reserve(&mut data, CONTEXT_KEY, Value::Object(context.merged_with(&rule.context)));

            let values = if rule.template.has_variables() {
                reserve(&mut data, NEW_KEY, output.clone());
                resolve_variables(&rule.template, &data)
            } else {
                Vec::new()
            };
            if self.mode == TransformMode::Exclusive {
                release(&mut data, NEW_KEY);
            }

            for expansion in expand(&rule.template, &values) {
                reserve(&mut data, COLUMN_KEY, Value::Object(expansion.bindings));
                if self.mode == TransformMode::Additive {
                    reserve(&mut data, NEW_KEY, output.clone());
                }

                let value = self
                    .engine
                    .apply(&data, &output, &rule.rules, &extra)
                    .map_err(|source| TransformError::RuleEvaluation {
                        destination: expansion.destination.clone(),
                        source,
                    })?;
                set_from_key(&mut output, &expansion.destination, value);
            }
        }

        Ok(output)
    }

    /// Transform a data item; a chain break passes through unchanged.
    pub fn transform_item(&self, item: &Item, context: &ExecutionContext) -> TransformResult<Item> {
        match item {
            Item::Data(record) => Ok(Item::Data(self.transform(record, context)?)),
            Item::ChainBreak => Ok(Item::ChainBreak),
        }
    }
}

impl ChainOperation for RuleTransformOperation {
    fn name(&self) -> &str {
        "rule-transform"
    }

    fn process(&mut self, item: Item, context: &ExecutionContext) -> OperationResult<Item> {
        Ok(self.transform_item(&item, context)?)
    }
}

fn reserve(data: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = data {
        map.insert(key.to_string(), value);
    }
}

fn release(data: &mut Value, key: &str) {
    if let Value::Object(map) = data {
        map.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::rules::RuleApplier;
    use serde_json::json;
    use std::sync::Mutex;

    fn operation(rules: Vec<RuleDefinition>, mode: TransformMode) -> RuleTransformOperation {
        RuleTransformOperation::new(Arc::new(RuleApplier::new()), rules, mode)
    }

    #[test]
    fn test_sales_fan_out() {
        let op = operation(
            vec![RuleDefinition::new("sales.{country}.{year}", json!({"expression": "record.year * 2"}))],
            TransformMode::Exclusive,
        );
        let out = op
            .transform(&json!({"country": ["FR", "DE"], "year": 2024}), &ExecutionContext::default())
            .unwrap();
        assert_eq!(out, json!({"sales": {"FR": {"2024": 4048}, "DE": {"2024": 4048}}}));
    }

    #[test]
    fn test_missing_variable_writes_empty_segment() {
        let op = operation(
            vec![RuleDefinition::new("x.{missing}", json!({"constant": 1}))],
            TransformMode::Exclusive,
        );
        let out = op.transform(&json!({"present": true}), &ExecutionContext::default()).unwrap();
        assert_eq!(out, json!({"x": {"": 1}}));
    }

    #[test]
    fn test_additive_keeps_untouched_fields() {
        let input = json!({"id": 7, "name": " ada ", "tags": ["a"]});
        let rules = vec![RuleDefinition::new(
            "name",
            json!({"get": "name", "operations": [{"type": "trim"}, {"type": "uppercase"}]}),
        )];

        let additive = operation(rules.clone(), TransformMode::Additive)
            .transform(&input, &ExecutionContext::default())
            .unwrap();
        assert_eq!(additive, json!({"id": 7, "name": "ADA", "tags": ["a"]}));

        let exclusive = operation(rules, TransformMode::Exclusive)
            .transform(&input, &ExecutionContext::default())
            .unwrap();
        assert_eq!(exclusive, json!({"name": "ADA"}));

        // Input untouched.
        assert_eq!(input["name"], " ada ");
    }

    #[test]
    fn test_context_merge_rule_wins() {
        let mut local = Map::new();
        local.insert("currency".into(), json!("USD"));
        let op = operation(
            vec![
                RuleDefinition::new("run_currency", json!({"get": "@context.currency"})),
                RuleDefinition::new("rule_currency", json!({"get": "@context.currency"})).with_context(local),
                RuleDefinition::new("batch", json!({"get": "@context.batch"})),
            ],
            TransformMode::Exclusive,
        );
        let ctx = ExecutionContext::default()
            .with_parameter("currency", json!("EUR"))
            .with_parameter("batch", json!(12));

        let out = op.transform(&json!({}), &ctx).unwrap();
        assert_eq!(out, json!({"run_currency": "EUR", "rule_currency": "USD", "batch": 12}));
    }

    #[test]
    fn test_variables_can_reference_new_output() {
        let op = operation(
            vec![
                RuleDefinition::new("code", json!({"constant": "A1"})),
                RuleDefinition::new("by_code.{@new.code}", json!({"get": "qty"})),
            ],
            TransformMode::Exclusive,
        );
        let out = op.transform(&json!({"qty": 3}), &ExecutionContext::default()).unwrap();
        assert_eq!(out, json!({"code": "A1", "by_code": {"A1": 3}}));
    }

    #[test]
    fn test_column_bindings_visible_to_rules() {
        let op = operation(
            vec![RuleDefinition::new("label.{lang}", json!({"expression": "\"title_\" + column.lang"}))],
            TransformMode::Exclusive,
        );
        let out = op.transform(&json!({"lang": ["en", "fr"]}), &ExecutionContext::default()).unwrap();
        assert_eq!(out, json!({"label": {"en": "title_en", "fr": "title_fr"}}));
    }

    #[test]
    fn test_engine_sees_new_only_in_additive_mode() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let seen = Arc::clone(&seen);
            move |record: &Value, _output: &Value, _rules: &Value, _extra: &Map<String, Value>| -> Result<Value, RuleError> {
                if let Ok(mut seen) = seen.lock() {
                    seen.push(record.get(NEW_KEY).is_some());
                }
                Ok(json!(1))
            }
        };
        let engine: Arc<dyn RuleEngine> = Arc::new(recorder);
        let rules = vec![RuleDefinition::new("a.{k}", json!(null))];

        RuleTransformOperation::new(Arc::clone(&engine), rules.clone(), TransformMode::Exclusive)
            .transform(&json!({"k": "x"}), &ExecutionContext::default())
            .unwrap();
        RuleTransformOperation::new(engine, rules, TransformMode::Additive)
            .transform(&json!({"k": "x"}), &ExecutionContext::default())
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_engine_failure_aborts_with_destination() {
        let failing = |_: &Value, _: &Value, _: &Value, _: &Map<String, Value>| -> Result<Value, RuleError> {
            Err(RuleError::InvalidRule("boom".into()))
        };
        let op = RuleTransformOperation::new(
            Arc::new(failing),
            vec![RuleDefinition::new("out.{k}", json!(null))],
            TransformMode::Additive,
        );
        let err = op.transform(&json!({"k": ["a", "b"]}), &ExecutionContext::default()).unwrap_err();
        match err {
            TransformError::RuleEvaluation { destination, .. } => assert_eq!(destination, "out.a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_collision_last_write_wins() {
        let op = operation(
            vec![RuleDefinition::new("v.{k}", json!({"get": "@column.k"}))],
            TransformMode::Exclusive,
        );
        // Two elements render to the same destination; the later one is written last.
        let out = op.transform(&json!({"k": ["1", 1]}), &ExecutionContext::default()).unwrap();
        assert_eq!(out, json!({"v": {"1": 1}}));
    }

    #[test]
    fn test_additive_write_into_input_sequence_keeps_elements() {
        let op = operation(
            vec![
                RuleDefinition::new("tags.{lang}", json!({"constant": "new"})),
                RuleDefinition::new("codes.{next}", json!({"constant": 30})),
            ],
            TransformMode::Additive,
        );
        let input = json!({"tags": ["a", "b"], "lang": "fr", "codes": [10, 20], "next": 2});
        let out = op.transform(&input, &ExecutionContext::default()).unwrap();
        assert_eq!(out["tags"], json!({"0": "a", "1": "b", "fr": "new"}));
        assert_eq!(out["codes"], json!([10, 20, 30]));
    }

    #[test]
    fn test_idempotent() {
        let op = operation(
            vec![
                RuleDefinition::new("sales.{country}", json!({"get": "amount"})),
                RuleDefinition::new("count", json!({"constant": 2})),
            ],
            TransformMode::Additive,
        );
        let input = json!({"country": ["FR", "DE"], "amount": 10});
        let ctx = ExecutionContext::default();
        assert_eq!(op.transform(&input, &ctx).unwrap(), op.transform(&input, &ctx).unwrap());
    }

    #[test]
    fn test_from_config_keeps_declaration_order() {
        let config: RuleTransformConfig = serde_json::from_value(json!({
            "rules": {
                "b": {"rules": {"constant": 1}},
                "a": {"rules": "b", "context": {"k": "v"}}
            },
            "add": true
        }))
        .unwrap();
        let op = RuleTransformOperation::from_config(Arc::new(RuleApplier::new()), &config).unwrap();
        assert_eq!(op.mode(), TransformMode::Additive);
        let templates: Vec<&str> = op.rules().iter().map(|r| r.template().raw()).collect();
        assert_eq!(templates, vec!["b", "a"]);

        // "a" reads the input field "b", which rule "b" does not touch in the evaluation record.
        let out = op.transform(&json!({"b": 0}), &ExecutionContext::default()).unwrap();
        assert_eq!(out, json!({"b": 1, "a": 0}));
    }

    #[test]
    fn test_chain_break_passes_through() {
        let mut op = operation(vec![RuleDefinition::new("a", json!({"constant": 1}))], TransformMode::Exclusive);
        let item = op.process(Item::ChainBreak, &ExecutionContext::default()).unwrap();
        assert!(item.is_chain_break());
    }

    #[test]
    fn test_operation_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleTransformOperation>();
    }
}
