//! Untyped filter representations passed between the early stages

use crate::ast::OrderEntry;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Raw filter input as received from a caller
#[derive(Debug, Clone, PartialEq)]
pub enum RawFilter {
    /// JSON document text
    Text(String),
    /// Already decoded mapping; either direct or bracket-notation keys
    Mapping(Map<String, Value>),
}

impl From<&str> for RawFilter {
    fn from(text: &str) -> Self {
        RawFilter::Text(text.to_string())
    }
}

impl From<String> for RawFilter {
    fn from(text: String) -> Self {
        RawFilter::Text(text)
    }
}

impl From<Map<String, Value>> for RawFilter {
    fn from(map: Map<String, Value>) -> Self {
        RawFilter::Mapping(map)
    }
}

impl From<Value> for RawFilter {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => RawFilter::Mapping(map),
            Value::String(text) => RawFilter::Text(text),
            other => RawFilter::Text(other.to_string()),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for RawFilter
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        RawFilter::Mapping(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parser output: the three clauses, still untyped
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterInput {
    /// Predicate clause
    pub where_clause: Option<Value>,
    /// Order clause in any accepted shape
    pub order: Option<Value>,
    /// Projection clause in any accepted shape
    pub fields: Option<Value>,
}

/// Normalizer output: canonical untyped clauses
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedFilter {
    /// Canonical predicate mapping
    pub where_clause: Option<Map<String, Value>>,
    /// Canonical sort keys
    pub order: Option<Vec<OrderEntry>>,
    /// Projection flags as written; range checked by the validator
    pub fields: Option<IndexMap<String, i64>>,
}

impl From<NormalizedFilter> for FilterInput {
    fn from(normalized: NormalizedFilter) -> Self {
        FilterInput {
            where_clause: normalized.where_clause.map(Value::Object),
            order: normalized.order.map(|entries| {
                Value::Array(
                    entries
                        .iter()
                        .map(|entry| Value::String(entry.to_string()))
                        .collect(),
                )
            }),
            fields: normalized.fields.map(|fields| {
                Value::Object(
                    fields
                        .into_iter()
                        .map(|(name, flag)| (name, Value::from(flag)))
                        .collect(),
                )
            }),
        }
    }
}
