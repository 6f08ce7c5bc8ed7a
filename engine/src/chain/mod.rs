//! Chain processing.
//!
//! A chain is an ordered list of operations. Each record enters the first
//! operation as a data item and moves down the chain until an operation
//! answers with [`Item::ChainBreak`] or the end of the chain is reached.
//! Once input is exhausted, every operation gets a chance to flush buffered
//! items, which then continue through the operations after it.
//!
//! ```text
//! record ──▶ [0] rule-transform ──▶ [1] simple-grouping ──▶ ┆ chainBreak
//!                                              │
//!                              finish() ───────┴──▶ [2] ... ──▶ output
//! ```

pub mod grouping;

use serde::Serialize;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::{ChainError, ChainResult, OperationResult};
use crate::item::Item;
use crate::logs::{log_info, log_info_indent, log_success};

pub use grouping::{GroupingConfig, KeyPaths, SimpleGroupingOperation, GROUP_KEY_SEPARATOR};

/// One step of a chain.
pub trait ChainOperation: Send {
    /// Kind name, used in logs and errors.
    fn name(&self) -> &str;

    /// Handle one item and return what moves on to the next operation.
    fn process(&mut self, item: Item, context: &ExecutionContext) -> OperationResult<Item>;

    /// Called once after the last input record; returns buffered items.
    fn finish(&mut self, _context: &ExecutionContext) -> OperationResult<Vec<Item>> {
        Ok(Vec::new())
    }
}

impl std::fmt::Debug for dyn ChainOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ChainOperation").field(&self.name()).finish()
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub records_in: usize,
    pub records_out: usize,
    pub chain_breaks: usize,
    pub flushed: usize,
}

/// Records that reached the end of the chain, with run statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainOutput {
    pub records: Vec<Value>,
    pub stats: ChainStats,
}

/// Runs records through an ordered list of operations.
#[derive(Default)]
pub struct ChainProcessor {
    operations: Vec<Box<dyn ChainOperation>>,
}

impl std::fmt::Debug for ChainProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainProcessor")
            .field("operations", &self.operation_names())
            .finish()
    }
}

impl ChainProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, operation: Box<dyn ChainOperation>) -> Self {
        self.push(operation);
        self
    }

    pub fn push(&mut self, operation: Box<dyn ChainOperation>) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name()).collect()
    }

    /// Run every record through the chain, then flush buffered items.
    ///
    /// The first operation error aborts the run.
    pub fn process<I>(&mut self, records: I, context: &ExecutionContext) -> ChainResult<ChainOutput>
    where
        I: IntoIterator<Item = Value>,
    {
        log_info(format!("Running chain: {}", self.operation_names().join(" → ")));

        let mut output = ChainOutput { records: Vec::new(), stats: ChainStats::default() };

        for record in records {
            output.stats.records_in += 1;
            self.route(0, Item::Data(record), context, &mut output)?;
        }

        for index in 0..self.operations.len() {
            let emitted = {
                let operation = &mut self.operations[index];
                operation.finish(context).map_err(|source| ChainError::Operation {
                    index,
                    operation: operation.name().to_string(),
                    source,
                })?
            };
            if !emitted.is_empty() {
                log_info_indent(
                    format!("{} flushed {} item(s)", self.operations[index].name(), emitted.len()),
                    1,
                );
            }
            for item in emitted {
                output.stats.flushed += 1;
                self.route(index + 1, item, context, &mut output)?;
            }
        }

        output.stats.records_out = output.records.len();
        log_success(format!(
            "Chain done: {} record(s) in, {} out",
            output.stats.records_in, output.stats.records_out
        ));
        Ok(output)
    }

    /// Send one item through the operations from `start` on.
    fn route(
        &mut self,
        start: usize,
        mut item: Item,
        context: &ExecutionContext,
        output: &mut ChainOutput,
    ) -> ChainResult<()> {
        for (index, operation) in self.operations.iter_mut().enumerate().skip(start) {
            item = operation.process(item, context).map_err(|source| ChainError::Operation {
                index,
                operation: operation.name().to_string(),
                source,
            })?;
            if item.is_chain_break() {
                output.stats.chain_breaks += 1;
                return Ok(());
            }
        }

        if let Item::Data(record) = item {
            output.records.push(record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GroupingError, OperationError};
    use crate::rules::RuleApplier;
    use crate::transform::{RuleDefinition, RuleTransformOperation, TransformMode};
    use serde_json::json;
    use std::sync::Arc;

    /// Breaks on records flagged `skip`.
    struct SkipFlagged;

    impl ChainOperation for SkipFlagged {
        fn name(&self) -> &str {
            "skip-flagged"
        }

        fn process(&mut self, item: Item, _context: &ExecutionContext) -> OperationResult<Item> {
            let skip = matches!(item.get_data().and_then(|v| v.get("skip")), Some(Value::Bool(true)));
            Ok(if skip { Item::ChainBreak } else { item })
        }
    }

    /// Rejects everything.
    struct Failing;

    impl ChainOperation for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn process(&mut self, _item: Item, _context: &ExecutionContext) -> OperationResult<Item> {
            Err(GroupingError::NotAnObject("nope".into()).into())
        }
    }

    fn upper_name() -> Box<dyn ChainOperation> {
        Box::new(RuleTransformOperation::new(
            Arc::new(RuleApplier::new()),
            vec![RuleDefinition::new(
                "name",
                json!({"get": "name", "operations": [{"type": "uppercase"}]}),
            )],
            TransformMode::Additive,
        ))
    }

    #[test]
    fn test_boxed_operation_debug_shows_name() {
        let op: Box<dyn ChainOperation> = Box::new(SkipFlagged);
        assert_eq!(format!("{:?}", op), r#"ChainOperation("skip-flagged")"#);
    }

    #[test]
    fn test_empty_chain_passes_records() {
        let mut chain = ChainProcessor::new();
        let out = chain.process(vec![json!({"a": 1})], &ExecutionContext::default()).unwrap();
        assert_eq!(out.records, vec![json!({"a": 1})]);
        assert_eq!(out.stats.records_in, 1);
        assert_eq!(out.stats.records_out, 1);
    }

    #[test]
    fn test_chain_break_stops_routing() {
        let mut chain = ChainProcessor::new()
            .with_operation(Box::new(SkipFlagged))
            .with_operation(Box::new(Failing));

        // The failing step is never reached for a skipped record.
        let out = chain
            .process(vec![json!({"skip": true})], &ExecutionContext::default())
            .unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.stats.chain_breaks, 1);
    }

    #[test]
    fn test_error_names_operation_index() {
        let mut chain = ChainProcessor::new().with_operation(upper_name()).with_operation(Box::new(Failing));
        let err = chain
            .process(vec![json!({"name": "ada"})], &ExecutionContext::default())
            .unwrap_err();
        match err {
            ChainError::Operation { index, operation, source } => {
                assert_eq!(index, 1);
                assert_eq!(operation, "failing");
                assert!(matches!(source, OperationError::Grouping(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_transform_then_group_then_transform() {
        let grouping = SimpleGroupingOperation::new(
            KeyPaths::One("team".into()),
            None,
        )
        .unwrap();
        let count = RuleTransformOperation::new(
            Arc::new(RuleApplier::new()),
            vec![RuleDefinition::new("size", json!({"expression": "record.members.len()"}))],
            TransformMode::Exclusive,
        );
        // Grouped payloads are arrays; WrapMembers turns them into mappings.
        let mut chain = ChainProcessor::new()
            .with_operation(upper_name())
            .with_operation(Box::new(grouping))
            .with_operation(Box::new(WrapMembers))
            .with_operation(Box::new(count));

        let records = vec![
            json!({"name": "ada", "team": "red"}),
            json!({"name": "bob", "team": "blue"}),
            json!({"name": "cy", "team": "red"}),
        ];
        let out = chain.process(records, &ExecutionContext::default()).unwrap();

        assert_eq!(out.records, vec![json!({"size": 2}), json!({"size": 1})]);
        assert_eq!(out.stats.records_in, 3);
        assert_eq!(out.stats.chain_breaks, 3);
        assert_eq!(out.stats.flushed, 2);
        assert_eq!(out.stats.records_out, 2);
    }

    /// Wraps an array payload as `{"members": [...]}`.
    struct WrapMembers;

    impl ChainOperation for WrapMembers {
        fn name(&self) -> &str {
            "wrap-members"
        }

        fn process(&mut self, item: Item, _context: &ExecutionContext) -> OperationResult<Item> {
            Ok(match item {
                Item::Data(members) => Item::Data(json!({"members": members})),
                other => other,
            })
        }
    }
}
