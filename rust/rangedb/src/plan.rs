//! Query validation and planning.
//!
//! A [`Query`] is turned into a [`Plan`] before any tree is touched: every rejection
//! happens here, using only the memoized field headers.

use std::cmp::Ordering;

use ahash::AHashSet;
use rangedb_common::{Result, error::Error};
use rangedb_format::{
    FieldType,
    key::compare_bytes,
    value::{encode_bool, encode_f64},
};
use rangedb_index::IndexHeader;
use rangedb_text_index::NgramTokenizer;
use serde_json::Value;

use crate::query::{Direction, Operation, Query, WhereNode};

/// One end of a key range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBound {
    pub key: Vec<u8>,
    pub inclusive: bool,
}

impl KeyBound {
    fn inclusive(key: Vec<u8>) -> KeyBound {
        KeyBound {
            key,
            inclusive: true,
        }
    }

    fn exclusive(key: Vec<u8>) -> KeyBound {
        KeyBound {
            key,
            inclusive: false,
        }
    }

    /// Whether `key` lies on the inner side of this lower bound.
    pub fn admits_from_below(&self, key: &[u8]) -> bool {
        match compare_bytes(key, &self.key) {
            Ordering::Greater => true,
            Ordering::Equal => self.inclusive,
            Ordering::Less => false,
        }
    }

    /// Whether `key` lies on the inner side of this upper bound.
    pub fn admits_from_above(&self, key: &[u8]) -> bool {
        match compare_bytes(key, &self.key) {
            Ordering::Less => true,
            Ordering::Equal => self.inclusive,
            Ordering::Greater => false,
        }
    }
}

/// An ordered scan of one value tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub field_name: String,
    pub field_type: FieldType,
    pub lower: Option<KeyBound>,
    pub upper: Option<KeyBound>,
    pub direction: Direction,
}

/// A ranked search over the n-gram trees of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    pub field_name: String,
    pub phrase: String,
    pub tokenizer: NgramTokenizer,
    /// The requested n-gram types the field is indexed under.
    pub field_types: Vec<FieldType>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Scan(ScanPlan),
    Search(SearchPlan),
    /// The query is valid but cannot match anything.
    Empty,
}

impl Plan {
    /// Validates `query` against the indexed fields and plans its execution.
    ///
    /// # Errors
    ///
    /// Returns a query validation error if the query combines a search with predicates
    /// or ordering, references more than one field, references an unknown field or a
    /// type the field is not indexed under, orders by a field other than the predicate
    /// field, or asks for unsupported gram sizes.
    pub fn build(query: &Query, headers: &[IndexHeader]) -> Result<Plan> {
        if query.order_by.len() > 1 {
            return Err(Error::query_validation(
                "ordering by more than one key is not supported",
            ));
        }
        let plan = match &query.search {
            Some(search) => {
                if !query.where_.is_empty() || !query.order_by.is_empty() {
                    return Err(Error::query_validation(
                        "search cannot be combined with where or orderBy",
                    ));
                }
                let config = search.config.unwrap_or_default();
                let tokenizer = NgramTokenizer::new(config.min_gram, config.max_gram)
                    .map_err(|e| Error::query_validation(e.to_string()))?;
                let header = find_header(headers, &search.key)?;
                let field_types: Vec<FieldType> = tokenizer
                    .field_types()
                    .filter(|t| header.has_type(*t))
                    .collect();
                if field_types.is_empty() {
                    return Err(Error::query_validation(format!(
                        "field '{}' has no n-gram index for grams {}..={}",
                        search.key, config.min_gram, config.max_gram
                    )));
                }
                Plan::Search(SearchPlan {
                    field_name: search.key.clone(),
                    phrase: search.like.clone(),
                    tokenizer,
                    field_types,
                })
            }
            None if !query.where_.is_empty() => plan_where(query, headers)?,
            None => match query.order_by.first() {
                Some(order) => {
                    let header = find_header(headers, &order.key)?;
                    let mut types = header.value_types();
                    let (Some(field_type), None) = (types.next(), types.next()) else {
                        return Err(Error::query_validation(format!(
                            "field '{}' must be indexed under exactly one value type to be ordered",
                            order.key
                        )));
                    };
                    Plan::Scan(ScanPlan {
                        field_name: order.key.clone(),
                        field_type,
                        lower: None,
                        upper: None,
                        direction: order.direction,
                    })
                }
                None => {
                    return Err(Error::query_validation(
                        "query needs a where, orderBy or search clause",
                    ));
                }
            },
        };
        if query.limit == Some(0) {
            return Ok(Plan::Empty);
        }
        Ok(plan)
    }
}

fn find_header<'a>(headers: &'a [IndexHeader], field_name: &str) -> Result<&'a IndexHeader> {
    headers
        .iter()
        .find(|h| h.field_name == field_name)
        .ok_or_else(|| Error::query_validation(format!("field '{field_name}' is not indexed")))
}

/// Index type and key bytes of a predicate value. Numbers are always compared as
/// `Float64`.
fn encode_value(node: &WhereNode) -> Result<(FieldType, Vec<u8>)> {
    match &node.value {
        Value::Number(n) => {
            let n = n.as_f64().ok_or_else(|| {
                Error::query_validation(format!("value of '{}' is not a finite number", node.key))
            })?;
            Ok((FieldType::Float64, encode_f64(n).to_vec()))
        }
        Value::String(s) => Ok((FieldType::String, s.as_bytes().to_vec())),
        Value::Bool(b) => Ok((FieldType::Boolean, encode_bool(*b).to_vec())),
        Value::Null if node.operation == Operation::Equal => Ok((FieldType::Null, Vec::new())),
        Value::Null => Err(Error::query_validation(format!(
            "null can only be compared with '==' (key '{}')",
            node.key
        ))),
        Value::Array(_) | Value::Object(_) => Err(Error::query_validation(format!(
            "value of '{}' must be a number, string, boolean or null",
            node.key
        ))),
    }
}

fn plan_where(query: &Query, headers: &[IndexHeader]) -> Result<Plan> {
    let keys: AHashSet<&str> = query.where_.iter().map(|w| w.key.as_str()).collect();
    if keys.len() > 1 {
        return Err(Error::query_validation(
            "where clauses on more than one field require a composite index, which is not supported",
        ));
    }
    let field_name = &query.where_[0].key;
    if let Some(order) = query.order_by.first() {
        if order.key != *field_name {
            return Err(Error::query_validation(format!(
                "orderBy key '{}' does not match where key '{field_name}'",
                order.key
            )));
        }
    }
    let header = find_header(headers, field_name)?;

    let mut field_type = None;
    let mut lower: Option<KeyBound> = None;
    let mut upper: Option<KeyBound> = None;
    for node in &query.where_ {
        let (value_type, key) = encode_value(node)?;
        match field_type {
            None => field_type = Some(value_type),
            Some(t) if t != value_type => {
                return Err(Error::query_validation(format!(
                    "where clauses on '{field_name}' compare against both {t} and {value_type}"
                )));
            }
            Some(_) => {}
        }
        let (new_lower, new_upper) = match node.operation {
            Operation::Equal => (
                Some(KeyBound::inclusive(key.clone())),
                Some(KeyBound::inclusive(key)),
            ),
            Operation::Greater => (Some(KeyBound::exclusive(key)), None),
            Operation::GreaterOrEqual => (Some(KeyBound::inclusive(key)), None),
            Operation::Less => (None, Some(KeyBound::exclusive(key))),
            Operation::LessOrEqual => (None, Some(KeyBound::inclusive(key))),
        };
        if let Some(bound) = new_lower {
            lower = Some(tighter(lower, bound, Ordering::Greater));
        }
        if let Some(bound) = new_upper {
            upper = Some(tighter(upper, bound, Ordering::Less));
        }
    }

    let field_type = field_type.ok_or_else(|| Error::query_validation("empty where clause"))?;
    if !header.has_type(field_type) {
        return Err(Error::query_validation(format!(
            "field '{field_name}' is not indexed as {field_type}"
        )));
    }

    if let (Some(lower), Some(upper)) = (&lower, &upper) {
        let empty = match compare_bytes(&lower.key, &upper.key) {
            Ordering::Greater => true,
            Ordering::Equal => !(lower.inclusive && upper.inclusive),
            Ordering::Less => false,
        };
        if empty {
            return Ok(Plan::Empty);
        }
    }

    let direction = match query.order_by.first() {
        Some(order) => order.direction,
        None if lower.is_none() && upper.is_some() => Direction::Descending,
        None => Direction::Ascending,
    };
    Ok(Plan::Scan(ScanPlan {
        field_name: field_name.clone(),
        field_type,
        lower,
        upper,
        direction,
    }))
}

/// The narrower of two bounds on the same side; `wins` is the ordering of the new key
/// relative to the current one that makes the new bound narrower.
fn tighter(current: Option<KeyBound>, new: KeyBound, wins: Ordering) -> KeyBound {
    let Some(current) = current else {
        return new;
    };
    match compare_bytes(&new.key, &current.key) {
        Ordering::Equal => KeyBound {
            inclusive: current.inclusive && new.inclusive,
            key: current.key,
        },
        ord if ord == wins => new,
        _ => current,
    }
}
