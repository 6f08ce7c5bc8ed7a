//! Named operation factories.
//!
//! Each kind comes with a JSON schema (draft 7) for its options. Options are
//! checked against the schema first, so every violation is reported at once,
//! and only then decoded into the kind's typed config.

use jsonschema::Validator;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chain::{ChainOperation, GroupingConfig, SimpleGroupingOperation};
use crate::error::{ConfigResult, ConfigurationError};
use crate::rules::{RuleApplier, RuleEngine};
use crate::transform::{RuleTransformConfig, RuleTransformOperation};

pub const RULE_TRANSFORM: &str = "rule-transform";
pub const SIMPLE_GROUPING: &str = "simple-grouping";

const RULE_TRANSFORM_SCHEMA: &str = include_str!("../../schemas/rule-transform.json");
const SIMPLE_GROUPING_SCHEMA: &str = include_str!("../../schemas/simple-grouping.json");

type BuildFn = dyn Fn(Value) -> ConfigResult<Box<dyn ChainOperation>> + Send + Sync;

struct Factory {
    schema: Value,
    validator: Validator,
    build: Box<BuildFn>,
}

/// Builds chain operations from a kind name and an options mapping.
pub struct OperationRegistry {
    factories: BTreeMap<String, Factory>,
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl OperationRegistry {
    /// Registry without any kind.
    pub fn empty() -> Self {
        Self { factories: BTreeMap::new() }
    }

    /// `rule-transform` (with the built-in [`RuleApplier`]) and `simple-grouping`.
    pub fn with_defaults() -> Self {
        Self::with_engine(Arc::new(RuleApplier::new()))
    }

    /// Default kinds, with `rule-transform` backed by `engine`.
    pub fn with_engine(engine: Arc<dyn RuleEngine>) -> Self {
        let mut registry = Self::empty();

        registry
            .register(RULE_TRANSFORM, &embedded(RULE_TRANSFORM_SCHEMA), move |options| {
                let config: RuleTransformConfig = serde_json::from_value(options)?;
                let operation = RuleTransformOperation::from_config(Arc::clone(&engine), &config)?;
                Ok(Box::new(operation) as Box<dyn ChainOperation>)
            })
            .expect("embedded rule-transform schema compiles");

        registry
            .register(SIMPLE_GROUPING, &embedded(SIMPLE_GROUPING_SCHEMA), |options| {
                let config: GroupingConfig = serde_json::from_value(options)?;
                let operation = SimpleGroupingOperation::from_config(config)?;
                Ok(Box::new(operation) as Box<dyn ChainOperation>)
            })
            .expect("embedded simple-grouping schema compiles");

        registry
    }

    /// Add or replace a kind.
    pub fn register<F>(&mut self, kind: &str, schema: &Value, build: F) -> ConfigResult<()>
    where
        F: Fn(Value) -> ConfigResult<Box<dyn ChainOperation>> + Send + Sync + 'static,
    {
        let validator = jsonschema::draft7::new(schema).map_err(|e| ConfigurationError::InvalidOptions {
            operation: kind.to_string(),
            errors: vec![format!("invalid schema: {}", e)],
        })?;
        self.factories.insert(
            kind.to_string(),
            Factory { schema: schema.clone(), validator, build: Box::new(build) },
        );
        Ok(())
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Options schema of a kind.
    pub fn schema(&self, kind: &str) -> Option<&Value> {
        self.factories.get(kind).map(|f| &f.schema)
    }

    /// Check options without building anything.
    pub fn validate(&self, kind: &str, options: &Value) -> ConfigResult<()> {
        let factory = self.factory(kind)?;
        check(kind, factory, options)
    }

    /// Validate the options and construct the operation.
    pub fn build(&self, kind: &str, options: Value) -> ConfigResult<Box<dyn ChainOperation>> {
        let factory = self.factory(kind)?;
        check(kind, factory, &options)?;
        (factory.build)(options)
    }

    fn factory(&self, kind: &str) -> ConfigResult<&Factory> {
        self.factories
            .get(kind)
            .ok_or_else(|| ConfigurationError::UnknownOperation(kind.to_string()))
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn check(kind: &str, factory: &Factory, options: &Value) -> ConfigResult<()> {
    let errors: Vec<String> = factory
        .validator
        .iter_errors(options)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidOptions { operation: kind.to_string(), errors })
    }
}

fn embedded(raw: &str) -> Value {
    serde_json::from_str(raw).expect("embedded schema is valid JSON")
}
