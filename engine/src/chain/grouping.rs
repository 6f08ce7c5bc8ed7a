//! Group records sharing the same key values.
//!
//! ```text
//! {team: red,  name: ada}          ┌ [{team: red, name: ada}, {team: red, name: cy}]
//! {team: blue, name: bob}   →      │
//! {team: red,  name: cy}           └ [{team: blue, name: bob}]
//! ```
//!
//! Records are buffered as they arrive (each yields a chain break) and the
//! groups are emitted, in first-seen order, when the chain finishes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::ChainOperation;
use crate::context::ExecutionContext;
use crate::error::{ConfigResult, ConfigurationError, GroupingError, OperationResult};
use crate::item::Item;
use crate::path::{get_from_key, value_to_key};

/// Joins the values of multi-path keys.
pub const GROUP_KEY_SEPARATOR: &str = "--";

/// One path or a list of paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPaths {
    One(String),
    Many(Vec<String>),
}

impl KeyPaths {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            KeyPaths::One(path) => vec![path],
            KeyPaths::Many(paths) => paths,
        }
    }
}

/// Options of the `simple-grouping` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GroupingConfig {
    pub grouping_key: KeyPaths,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_identifier: Option<KeyPaths>,
}

#[derive(Debug, Default)]
struct Group {
    records: Vec<Value>,
    /// Identifier value → position in `records`.
    positions: HashMap<String, usize>,
}

/// Buffers records per group key until the end of the stream.
#[derive(Debug)]
pub struct SimpleGroupingOperation {
    grouping_key: Vec<String>,
    group_identifier: Vec<String>,
    groups: Vec<Group>,
    index: HashMap<String, usize>,
}

impl SimpleGroupingOperation {
    /// Fails when the grouping key is empty or has a blank path.
    pub fn new(grouping_key: KeyPaths, group_identifier: Option<KeyPaths>) -> ConfigResult<Self> {
        let grouping_key = grouping_key.into_vec();
        let group_identifier = group_identifier.map(KeyPaths::into_vec).unwrap_or_default();

        let mut errors = Vec::new();
        if grouping_key.is_empty() {
            errors.push("grouping-key must not be empty".to_string());
        }
        if grouping_key.iter().any(|p| p.trim().is_empty()) {
            errors.push("grouping-key must not contain blank paths".to_string());
        }
        if group_identifier.iter().any(|p| p.trim().is_empty()) {
            errors.push("group-identifier must not contain blank paths".to_string());
        }
        if !errors.is_empty() {
            return Err(ConfigurationError::InvalidOptions {
                operation: "simple-grouping".to_string(),
                errors,
            });
        }

        Ok(Self {
            grouping_key,
            group_identifier,
            groups: Vec::new(),
            index: HashMap::new(),
        })
    }

    pub fn from_config(config: GroupingConfig) -> ConfigResult<Self> {
        Self::new(config.grouping_key, config.group_identifier)
    }

    /// Number of groups buffered so far.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn key_for(record: &Value, paths: &[String]) -> String {
        paths
            .iter()
            .map(|path| value_to_key(&get_from_key(record, path, Value::Null)))
            .collect::<Vec<_>>()
            .join(GROUP_KEY_SEPARATOR)
    }

    fn add(&mut self, record: Value) -> Result<(), GroupingError> {
        if !record.is_object() {
            return Err(GroupingError::NotAnObject(record.to_string()));
        }

        let key = Self::key_for(&record, &self.grouping_key);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.groups.push(Group::default());
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[slot];

        if self.group_identifier.is_empty() {
            group.records.push(record);
            return Ok(());
        }

        let identifier = Self::key_for(&record, &self.group_identifier);
        match group.positions.get(&identifier) {
            Some(&position) => group.records[position] = record,
            None => {
                group.positions.insert(identifier, group.records.len());
                group.records.push(record);
            }
        }
        Ok(())
    }
}

impl ChainOperation for SimpleGroupingOperation {
    fn name(&self) -> &str {
        "simple-grouping"
    }

    fn process(&mut self, item: Item, _context: &ExecutionContext) -> OperationResult<Item> {
        if let Item::Data(record) = item {
            self.add(record)?;
        }
        Ok(Item::ChainBreak)
    }

    fn finish(&mut self, _context: &ExecutionContext) -> OperationResult<Vec<Item>> {
        self.index.clear();
        Ok(std::mem::take(&mut self.groups)
            .into_iter()
            .map(|group| Item::Data(Value::Array(group.records)))
            .collect())
    }
}
