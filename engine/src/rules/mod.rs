//! Rule evaluation.
//!
//! The transform operation talks to a [`RuleEngine`]. [`RuleApplier`] is the
//! built-in one: each rule reads a value (`get`, `concat`, `constant` or a Rhai
//! `expression`), runs it through [`Operation`]s and falls back to a default.
//!
//! ```rust,ignore
//! use chain_etl::rules::{RuleApplier, RuleEngine};
//! use serde_json::{json, Map};
//!
//! let applier = RuleApplier::new();
//! let value = applier.apply(
//!     &json!({"year": 2024}),
//!     &json!({}),
//!     &json!({"expression": "record.year * 2"}),
//!     &Map::new(),
//! )?;
//! assert_eq!(value, json!(4048));
//! ```

pub mod applier;
pub mod engine;
pub mod operations;
pub mod rule;

pub use applier::RuleApplier;
pub use engine::RuleEngine;
pub use operations::{operations_description, Operation};
pub use rule::{is_empty, parse_payload, RuleSource, ValueRule};
