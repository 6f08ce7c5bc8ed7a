//! # chain-etl - rule-driven transform chains for nested JSON records
//!
//! Records flow through a chain of operations. The core operation rewrites
//! each record by evaluating rules into destination paths; destination
//! templates such as `sales.{country}.{year}` fan out into one path per
//! combination of variable values.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────────┐     ┌─────────────┐
//! │   Records   │────▶│  rule-transform  │────▶│ simple-grouping  │────▶│   Records   │
//! │   (JSON)    │     │ (templates+rules)│     │  (buffer, flush) │     │   (JSON)    │
//! └─────────────┘     └──────────────────┘     └──────────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chain_etl::{example_chain, ChainConfig, ExecutionContext, OperationRegistry};
//! use serde_json::json;
//!
//! let mut chain = ChainConfig::from_value(example_chain())?
//!     .build(&OperationRegistry::with_defaults())?;
//! let output = chain.process(vec![json!({"id": 1, "email": "a@b.c"})], &ExecutionContext::from_env())?;
//! println!("{} records", output.records.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`item`] - Items and chain-break signal
//! - [`context`] - Execution context parameters
//! - [`path`] - Dotted-path access to nested values
//! - [`rules`] - Rule engine seam and the built-in rule applier
//! - [`transform`] - Templates, expansion and the rule transform
//! - [`chain`] - Chain processor and grouping
//! - [`builder`] - Operation registry and chain configuration
//! - [`logs`] - Run log broadcaster

// Core modules
pub mod context;
pub mod error;
pub mod item;
pub mod logs;
pub mod path;

// Rules
pub mod rules;

// Transformation
pub mod transform;

// Chain
pub mod builder;
pub mod chain;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ChainError, ChainResult, ConfigResult, ConfigurationError, GroupingError, OperationError,
    OperationResult, RuleError, RuleResult, TransformError, TransformResult,
};

// =============================================================================
// Re-exports - Core
// =============================================================================

pub use context::{ExecutionContext, ENV_PREFIX};
pub use item::{Item, ItemSignal};
pub use path::{get_from_key, set_from_key, value_to_key};

// =============================================================================
// Re-exports - Rules
// =============================================================================

pub use rules::{operations_description, Operation, RuleApplier, RuleEngine, ValueRule};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    process_concurrently, ColumnTemplate, RuleDefinition, RuleEntry, RuleTransformConfig,
    RuleTransformOperation, TransformMode,
};

// =============================================================================
// Re-exports - Chain
// =============================================================================

pub use chain::{ChainOperation, ChainOutput, ChainProcessor, ChainStats, SimpleGroupingOperation};

// =============================================================================
// Re-exports - Builder
// =============================================================================

pub use builder::{example_chain, ChainConfig, OperationRegistry, RULE_TRANSFORM, SIMPLE_GROUPING};
