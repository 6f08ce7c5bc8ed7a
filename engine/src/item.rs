//! Items flowing through a chain.

use serde_json::Value;
use std::fmt;

/// One unit of data moving between chain operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// A record to process.
    Data(Value),
    /// Stop routing this item to the rest of the chain.
    ChainBreak,
}

/// Discriminator the chain processor routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSignal {
    Data,
    ChainBreak,
}

impl ItemSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSignal::Data => "data",
            ItemSignal::ChainBreak => "chainBreak",
        }
    }
}

impl fmt::Display for ItemSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Item {
    pub fn data(value: Value) -> Self {
        Item::Data(value)
    }

    pub fn signal(&self) -> ItemSignal {
        match self {
            Item::Data(_) => ItemSignal::Data,
            Item::ChainBreak => ItemSignal::ChainBreak,
        }
    }

    /// The payload of a data item, `None` for a chain break.
    pub fn get_data(&self) -> Option<&Value> {
        match self {
            Item::Data(value) => Some(value),
            Item::ChainBreak => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            Item::Data(value) => Some(value),
            Item::ChainBreak => None,
        }
    }

    pub fn is_chain_break(&self) -> bool {
        matches!(self, Item::ChainBreak)
    }
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        Item::Data(value)
    }
}
