//! The rule engine seam.

use serde_json::{Map, Value};

use crate::error::RuleResult;

/// Computes one output value from a record and an opaque rule payload.
///
/// The transform operation never looks inside `rules`; it hands over the
/// evaluation record (input plus the reserved `@context`, `@column` and, in
/// additive mode, `@new` keys), the output built so far, and the payload from
/// configuration. Implementations must be shareable across worker threads.
pub trait RuleEngine: Send + Sync {
    fn apply(
        &self,
        record: &Value,
        output: &Value,
        rules: &Value,
        extra: &Map<String, Value>,
    ) -> RuleResult<Value>;

    fn name(&self) -> &str {
        "rule-engine"
    }
}

impl<F> RuleEngine for F
where
    F: Fn(&Value, &Value, &Value, &Map<String, Value>) -> RuleResult<Value> + Send + Sync,
{
    fn apply(
        &self,
        record: &Value,
        output: &Value,
        rules: &Value,
        extra: &Map<String, Value>,
    ) -> RuleResult<Value> {
        self(record, output, rules, extra)
    }

    fn name(&self) -> &str {
        "closure"
    }
}
