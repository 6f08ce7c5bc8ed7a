//! Concurrent record transform.
//!
//! Records are independent, so a batch is split into contiguous chunks and
//! each chunk runs on the blocking pool. Results come back in input order.

use futures::future::try_join_all;
use std::sync::Arc;

use super::operation::RuleTransformOperation;
use crate::context::ExecutionContext;
use crate::error::{TransformError, TransformResult};
use crate::item::Item;

/// Transform `items` with up to `workers` concurrent tasks.
///
/// The first failing record fails the whole batch.
pub async fn process_concurrently(
    operation: Arc<RuleTransformOperation>,
    items: Vec<Item>,
    context: Arc<ExecutionContext>,
    workers: usize,
) -> TransformResult<Vec<Item>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let workers = workers.max(1);
    let chunk_size = items.len().div_ceil(workers);

    let mut chunks = Vec::with_capacity(workers);
    let mut rest = items;
    while !rest.is_empty() {
        let tail = rest.split_off(chunk_size.min(rest.len()));
        chunks.push(std::mem::replace(&mut rest, tail));
    }

    let tasks = chunks.into_iter().map(|chunk| {
        let operation = Arc::clone(&operation);
        let context = Arc::clone(&context);
        async move {
            tokio::task::spawn_blocking(move || {
                chunk
                    .iter()
                    .map(|item| operation.transform_item(item, &context))
                    .collect::<TransformResult<Vec<_>>>()
            })
            .await
            .map_err(|e| TransformError::Worker(e.to_string()))?
        }
    });

    let results = try_join_all(tasks).await?;
    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleApplier;
    use crate::transform::{RuleDefinition, TransformMode};
    use serde_json::json;

    fn doubling() -> Arc<RuleTransformOperation> {
        Arc::new(RuleTransformOperation::new(
            Arc::new(RuleApplier::new()),
            vec![RuleDefinition::new("double", json!({"expression": "record.n * 2"}))],
            TransformMode::Exclusive,
        ))
    }

    #[tokio::test]
    async fn test_preserves_order() {
        let items: Vec<Item> = (0..25).map(|n| Item::data(json!({"n": n}))).collect();
        let expected: Vec<Item> = (0..25).map(|n| Item::data(json!({"double": n * 2}))).collect();

        for workers in [1, 3, 8, 64] {
            let out = process_concurrently(doubling(), items.clone(), Arc::default(), workers)
                .await
                .unwrap();
            assert_eq!(out, expected);
        }
    }

    #[tokio::test]
    async fn test_matches_sequential() {
        let op = doubling();
        let ctx = ExecutionContext::default();
        let items = vec![Item::data(json!({"n": 1})), Item::ChainBreak, Item::data(json!({"n": 5}))];

        let sequential: Vec<Item> = items
            .iter()
            .map(|item| op.transform_item(item, &ctx).unwrap())
            .collect();
        let concurrent = process_concurrently(op, items, Arc::new(ctx), 2).await.unwrap();
        assert_eq!(concurrent, sequential);
    }

    #[tokio::test]
    async fn test_failure_fails_batch() {
        let op = Arc::new(RuleTransformOperation::new(
            Arc::new(RuleApplier::new()),
            vec![RuleDefinition::new("x", json!({"expression": "record.n +"}))],
            TransformMode::Exclusive,
        ));
        let items = vec![Item::data(json!({"n": 1})), Item::data(json!({"n": 2}))];
        let err = process_concurrently(op, items, Arc::default(), 2).await.unwrap_err();
        assert!(matches!(err, TransformError::RuleEvaluation { .. }));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let out = process_concurrently(doubling(), Vec::new(), Arc::default(), 4).await.unwrap();
        assert!(out.is_empty());
    }
}
