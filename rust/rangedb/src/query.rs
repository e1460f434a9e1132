//! The declarative query model.
//!
//! Queries deserialize from JSON:
//!
//! ```json
//! {
//!   "where": [{ "key": "age", "operation": ">=", "value": 30 }],
//!   "orderBy": [{ "key": "age", "direction": "DESC" }],
//!   "select": ["name", "address.city"],
//!   "limit": 10
//! }
//! ```
//!
//! or, for a ranked search:
//!
//! ```json
//! { "search": { "key": "title", "like": "wake me up", "config": { "minGram": 1, "maxGram": 3 } } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rangedb_text_index::tokenizers::{DEFAULT_MAX_GRAM, DEFAULT_MIN_GRAM};

/// Comparison operator of a [`WhereNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::Less => "<",
            Operation::LessOrEqual => "<=",
            Operation::Equal => "==",
            Operation::GreaterOrEqual => ">=",
            Operation::Greater => ">",
        })
    }
}

/// A single predicate: `key <operation> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereNode {
    pub key: String,
    pub operation: Operation,
    pub value: Value,
}

impl WhereNode {
    pub fn new(key: impl Into<String>, operation: Operation, value: impl Into<Value>) -> WhereNode {
        WhereNode {
            key: key.into(),
            operation,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "ASC")]
    Ascending,
    #[serde(rename = "DESC")]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: String,
    #[serde(default)]
    pub direction: Direction,
}

/// Gram sizes of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default = "default_min_gram")]
    pub min_gram: usize,
    #[serde(default = "default_max_gram")]
    pub max_gram: usize,
}

fn default_min_gram() -> usize {
    DEFAULT_MIN_GRAM
}

fn default_max_gram() -> usize {
    DEFAULT_MAX_GRAM
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            min_gram: DEFAULT_MIN_GRAM,
            max_gram: DEFAULT_MAX_GRAM,
        }
    }
}

/// A ranked n-gram search of `like` over the field `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    pub key: String,
    pub like: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SearchConfig>,
}

/// A query against a [`Database`](crate::Database).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub where_: Vec<WhereNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Query {
    pub fn from_json(json: &str) -> serde_json::Result<Query> {
        serde_json::from_str(json)
    }
}
