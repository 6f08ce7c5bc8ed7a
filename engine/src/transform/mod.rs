//! Record transformation.
//!
//! - Template: destination templates with `{variable}` placeholders
//! - Expander: variable resolution and cartesian expansion
//! - Operation: the rule-driven record transform
//! - Parallel: concurrent batch transform

pub mod expander;
pub mod operation;
pub mod parallel;
pub mod template;

pub use expander::{expand, expand_bindings, resolve_variables, Expansion, VariableValue};
pub use operation::{
    RuleDefinition, RuleEntry, RuleTransformConfig, RuleTransformOperation, TransformMode, COLUMN_KEY, CONTEXT_KEY, NEW_KEY,
};
pub use parallel::process_concurrently;
pub use template::ColumnTemplate;
