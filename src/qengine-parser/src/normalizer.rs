//! Canonicalization of parsed filter clauses
//!
//! The normalizer turns every accepted input shape into one canonical form:
//!
//! - operator keys resolved to their `$` symbols (aliases and, optionally,
//!   case-folding),
//! - field values expanded to operator mappings (`"books"` becomes
//!   `{"$eq": "books"}`),
//! - single-element `$and`/`$or` lists hoisted into their parent,
//! - order clauses as sort keys, projections as flag mappings.
//!
//! Normalizing a normalized filter returns it unchanged.

use crate::input::{FilterInput, NormalizedFilter};
use crate::order::normalize_order;
use crate::parser::json_type_name;
use indexmap::IndexMap;
use log::{trace, warn};
use qengine_shared::{
    canonical_operator, LogicalOperator, OperatorKey, ParserConfig, QEngineError, Result,
};
use serde_json::{Map, Value};

const AND: &str = "$and";

/// Canonicalizes parser output
#[derive(Debug, Clone, Default)]
pub struct FilterNormalizer {
    config: ParserConfig,
}

impl FilterNormalizer {
    /// Create a normalizer; operator matching follows `config`
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Normalize all three clauses
    pub fn normalize(&self, input: &FilterInput) -> Result<NormalizedFilter> {
        let where_clause = match &input.where_clause {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => {
                let normalized = self.normalize_where(map);
                if normalized.is_empty() && self.config.allow_empty_conditions {
                    None
                } else {
                    Some(normalized)
                }
            }
            Some(other) => {
                return Err(QEngineError::validation(format!(
                    "Where clause must be an object, got {}",
                    json_type_name(other)
                )))
            }
        };

        let order = match &input.order {
            None => None,
            Some(order) => Some(normalize_order(order)?).filter(|entries| !entries.is_empty()),
        };

        let fields = match &input.fields {
            None => None,
            Some(fields) => Some(normalize_fields(fields)?).filter(|map| !map.is_empty()),
        };

        Ok(NormalizedFilter {
            where_clause,
            order,
            fields,
        })
    }

    /// Normalize one condition mapping
    pub fn normalize_where(&self, condition: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        let mut deferred = Vec::new();

        for (key, value) in condition {
            match self.logical_key(key, value) {
                Some(op) => {
                    let Value::Array(items) = value else {
                        // non-list operand, reported by the validator
                        insert_or_defer(&mut out, op.symbol().to_string(), value.clone(), &mut deferred);
                        continue;
                    };
                    let children: Vec<Value> = items
                        .iter()
                        .map(|item| match item {
                            Value::Object(child) => Value::Object(self.normalize_where(child)),
                            other => other.clone(),
                        })
                        .collect();

                    if children.is_empty() && self.config.allow_empty_conditions {
                        trace!("Dropping empty {op}");
                        continue;
                    }

                    if children.len() == 1 && op.is_associative() {
                        if let Some(Value::Object(child)) = children.first() {
                            trace!("Hoisting single-element {op}");
                            for (child_key, child_value) in child {
                                insert_or_defer(&mut out, child_key.clone(), child_value.clone(), &mut deferred);
                            }
                            continue;
                        }
                    }

                    insert_or_defer(&mut out, op.symbol().to_string(), Value::Array(children), &mut deferred);
                }
                None => {
                    let normalized = self.normalize_field_value(value);
                    insert_or_defer(&mut out, key.clone(), normalized, &mut deferred);
                }
            }
        }

        if !deferred.is_empty() {
            match out.get_mut(AND) {
                Some(Value::Array(existing)) => existing.extend(deferred),
                _ => {
                    out.insert(AND.to_string(), Value::Array(deferred));
                }
            }
        }
        out
    }

    // Aliases (`and`) only count as logical keys when they carry a list;
    // a `$`-prefixed logical key always does.
    fn logical_key(&self, key: &str, value: &Value) -> Option<LogicalOperator> {
        match canonical_operator(key, self.config.case_sensitive_operators)? {
            OperatorKey::Logical(op) if key.starts_with('$') || value.is_array() => Some(op),
            _ => None,
        }
    }

    fn normalize_field_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) if self.is_operator_map(map) => {
                let mut out = Map::new();
                for (key, operand) in map {
                    let key = canonical_operator(key, self.config.case_sensitive_operators)
                        .map_or_else(|| key.clone(), |op| op.symbol().to_string());
                    if out.contains_key(&key) {
                        warn!("Duplicate operator '{key}' on one field; keeping the first");
                        continue;
                    }
                    out.insert(key, operand.clone());
                }
                Value::Object(out)
            }
            literal => {
                let mut out = Map::new();
                out.insert("$eq".to_string(), literal.clone());
                Value::Object(out)
            }
        }
    }

    // Empty mappings count as (empty) operator mappings so they are reported.
    fn is_operator_map(&self, map: &Map<String, Value>) -> bool {
        map.is_empty()
            || map.keys().any(|k| k.starts_with('$'))
            || map.keys().all(|k| {
                canonical_operator(k, self.config.case_sensitive_operators).is_some()
            })
    }
}

/// Canonicalize a projection clause into field flags
pub fn normalize_fields(fields: &Value) -> Result<IndexMap<String, i64>> {
    let mut out = IndexMap::new();
    match fields {
        Value::Null => {}
        Value::Object(map) => {
            for (name, flag) in map {
                let flag = match flag {
                    Value::Bool(include) => i64::from(*include),
                    Value::Number(number) => number
                        .as_i64()
                        .or_else(|| {
                            number
                                .as_f64()
                                .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                                .map(|f| f as i64)
                        })
                        .ok_or_else(|| invalid_projection(name, flag))?,
                    other => return Err(invalid_projection(name, other)),
                };
                out.insert(name.clone(), flag);
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(name) => {
                        out.insert(name.trim().to_string(), 1);
                    }
                    other => {
                        return Err(QEngineError::validation(format!(
                            "Field names must be strings, got {}",
                            json_type_name(other)
                        )))
                    }
                }
            }
        }
        Value::String(text) => {
            for name in text.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                out.insert(name.to_string(), 1);
            }
        }
        other => {
            return Err(QEngineError::validation(format!(
                "Fields must be an object or a list of names, got {}",
                json_type_name(other)
            )))
        }
    }
    Ok(out)
}

fn invalid_projection(name: &str, value: &Value) -> QEngineError {
    QEngineError::validation(format!(
        "Invalid projection value {value} for field '{name}'; expected 0, 1 or a boolean"
    ))
}

// Everything in one condition mapping is AND-ed, so a key that cannot be
// merged in place moves into the mapping's `$and` list.
fn insert_or_defer(out: &mut Map<String, Value>, key: String, value: Value, deferred: &mut Vec<Value>) {
    match out.get_mut(&key) {
        None => {
            out.insert(key, value);
        }
        Some(Value::Array(existing)) if key == AND => match value {
            Value::Array(items) => existing.extend(items),
            other => deferred.push(single_entry(key, other)),
        },
        Some(Value::Object(existing))
            if !key.starts_with('$')
                && value
                    .as_object()
                    .is_some_and(|incoming| incoming.keys().all(|k| !existing.contains_key(k))) =>
        {
            if let Value::Object(incoming) = value {
                existing.extend(incoming);
            }
        }
        Some(_) => deferred.push(single_entry(key, value)),
    }
}

fn single_entry(key: String, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key, value);
    Value::Object(map)
}
