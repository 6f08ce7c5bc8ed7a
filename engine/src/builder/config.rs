//! Chain configuration files.
//!
//! ```json
//! {
//!   "chain": [
//!     { "operation": "rule-transform", "options": { "rules": { ... }, "add": false } },
//!     { "operation": "simple-grouping", "options": { "grouping-key": "id" } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

use super::registry::OperationRegistry;
use crate::chain::ChainProcessor;
use crate::error::{ConfigResult, ConfigurationError};
use crate::logs::log_info_indent;

/// One step of a chain configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationConfig {
    pub operation: String,
    #[serde(default = "empty_options")]
    pub options: Value,
}

fn empty_options() -> Value {
    Value::Object(Map::new())
}

/// A full chain: operations in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub chain: Vec<OperationConfig>,
}

impl ChainConfig {
    pub fn from_json(raw: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_value(value: Value) -> ConfigResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Every problem in the chain, one message per step.
    pub fn check(&self, registry: &OperationRegistry) -> Vec<String> {
        self.chain
            .iter()
            .enumerate()
            .filter_map(|(index, step)| {
                registry
                    .validate(&step.operation, &step.options)
                    .err()
                    .map(|e| format!("#{} ({}): {}", index, step.operation, e))
            })
            .collect()
    }

    /// Build every operation. Fails on the first invalid step, before any
    /// record is processed.
    pub fn build(&self, registry: &OperationRegistry) -> ConfigResult<ChainProcessor> {
        let mut processor = ChainProcessor::new();
        for (index, step) in self.chain.iter().enumerate() {
            let operation = registry.build(&step.operation, step.options.clone())?;
            log_info_indent(format!("#{} {}", index, operation.name()), 1);
            processor.push(operation);
        }
        Ok(processor)
    }
}

impl std::str::FromStr for ChainConfig {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json(s)
    }
}

/// A small chain showing both operation kinds.
pub fn example_chain() -> Value {
    json!({
        "chain": [
            {
                "operation": "rule-transform",
                "options": {
                    "add": false,
                    "rules": {
                        "order_id": { "rules": "id" },
                        "customer": {
                            "rules": [
                                { "concat": ["first_name", "last_name"], "separator": " " },
                                { "get": "email" },
                                { "constant": "anonymous" }
                            ]
                        },
                        "sales.{country}.{year}": {
                            "rules": { "expression": "record.amount * context.rate" },
                            "context": { "rate": 1.2 }
                        },
                        "currency": {
                            "rules": {
                                "get": "@context.currency",
                                "operations": [{ "type": "uppercase" }],
                                "default": "EUR"
                            }
                        }
                    }
                }
            },
            {
                "operation": "simple-grouping",
                "options": {
                    "grouping-key": "customer",
                    "group-identifier": "order_id"
                }
            }
        ]
    })
}
