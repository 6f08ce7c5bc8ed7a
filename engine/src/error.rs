//! Error types for the chain engine.
//!
//! One enum per layer, converted upward with `From` so `?` works across
//! boundaries:
//!
//! - [`RuleError`] - raised by a rule engine while computing one value
//! - [`TransformError`] - rule transform failures (wraps [`RuleError`])
//! - [`GroupingError`] - grouping operation failures
//! - [`ConfigurationError`] - invalid chain or operation configuration
//! - [`ChainError`] - top-level run errors, tagged with the failing operation
//!
//! A variable or read path that does not resolve is never an error: it
//! degrades to an empty string or the caller's default.

use thiserror::Error;

// =============================================================================
// Rule Engine Errors
// =============================================================================

/// Errors raised while evaluating a rule payload.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The payload does not describe a usable rule.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// A script expression failed to compile or run.
    #[error("Expression '{expression}' failed: {message}")]
    Expression { expression: String, message: String },

    /// A value operation could not be applied.
    #[error("Operation '{operation}' failed: {message}")]
    Operation { operation: String, message: String },

    /// Payload could not be decoded.
    #[error("Rule JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Transform Errors
// =============================================================================

/// Errors from the rule transform operation.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The rule engine failed for one expansion; the whole item is aborted.
    #[error("Rule evaluation failed for '{destination}': {source}")]
    RuleEvaluation {
        destination: String,
        #[source]
        source: RuleError,
    },

    /// A concurrent worker stopped before producing its item.
    #[error("Worker failed: {0}")]
    Worker(String),
}

// =============================================================================
// Grouping Errors
// =============================================================================

/// Errors from the grouping operation.
#[derive(Debug, Error)]
pub enum GroupingError {
    /// Grouping only accepts mapping records.
    #[error("Cannot group a non-object record: {0}")]
    NotAnObject(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while building a chain, before any item is processed.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No factory registered under that name.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Options failed schema validation.
    #[error("Invalid options for '{operation}': {}", errors.join("; "))]
    InvalidOptions {
        operation: String,
        errors: Vec<String>,
    },

    /// Chain configuration could not be read.
    #[error("Failed to read chain configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Chain configuration is not valid JSON for the expected shape.
    #[error("Configuration JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Chain Errors (top-level)
// =============================================================================

/// Top-level errors returned by [`crate::chain::ChainProcessor`].
#[derive(Debug, Error)]
pub enum ChainError {
    /// An operation failed while processing an item.
    #[error("Operation #{index} ({operation}) failed: {source}")]
    Operation {
        index: usize,
        operation: String,
        #[source]
        source: OperationError,
    },
}

/// Failure of a single chain operation, independent of its position.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Grouping(#[from] GroupingError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for rule engines.
pub type RuleResult<T> = Result<T, RuleError>;

/// Result type for rule transforms.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for chain operations.
pub type OperationResult<T> = Result<T, OperationError>;

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Result type for chain runs.
pub type ChainResult<T> = Result<T, ChainError>;
