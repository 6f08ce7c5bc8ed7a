//! Pipeline-wide execution context.

use serde_json::{Map, Value};

/// Prefix of environment variables that become context parameters.
pub const ENV_PREFIX: &str = "ETL_CONTEXT_";

/// Parameters visible to every rule evaluation of a run.
///
/// Built once before the run and only read afterwards; share it by reference
/// (or behind an `Arc` for concurrent workers).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    parameters: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new(parameters: Map<String, Value>) -> Self {
        Self { parameters }
    }

    /// Collect `ETL_CONTEXT_*` variables from an iterator of `(name, value)`.
    ///
    /// The suffix is lowercased: `ETL_CONTEXT_COUNTRY=FR` gives `country`.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut parameters = Map::new();
        for (key, value) in vars {
            if let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) {
                if !name.is_empty() {
                    parameters.insert(name.to_lowercase(), parse_parameter(value.as_ref()));
                }
            }
        }
        Self { parameters }
    }

    /// Context from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Add or replace one parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Parameters overlaid with a rule's local context; local values win.
    pub fn merged_with(&self, local: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = self.parameters.clone();
        for (key, value) in local {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Parse a raw parameter: JSON when it parses, plain string otherwise.
pub fn parse_parameter(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
