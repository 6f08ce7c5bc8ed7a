//! Chain assembly from configuration.
//!
//! - Registry: operation kinds, their option schemas and constructors
//! - Config: the JSON chain file format

pub mod config;
pub mod registry;

pub use config::{example_chain, ChainConfig, OperationConfig};
pub use registry::{OperationRegistry, RULE_TRANSFORM, SIMPLE_GROUPING};
