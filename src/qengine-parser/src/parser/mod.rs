//! Parser implementation
//!
//! Detects the input shape (JSON text, direct mapping, bracket-notation
//! mapping) and produces the three untyped clauses.

mod bracket;
mod coerce;

use crate::input::{FilterInput, RawFilter};
use log::{debug, warn};
use qengine_shared::{canonical_operator, OperatorKey, ParserConfig, QEngineError, Result};
use serde_json::{Map, Value};

/// Clause names accepted at the top level
pub const CLAUSES: [&str; 3] = ["where", "order", "fields"];

/// Main parser for raw filter input
#[derive(Debug, Clone, Default)]
pub struct FilterParser {
    config: ParserConfig,
}

impl FilterParser {
    /// Create a parser with the given configuration
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parser configuration
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse raw input into untyped clauses
    pub fn parse(&self, input: impl Into<RawFilter>) -> Result<FilterInput> {
        match input.into() {
            RawFilter::Text(text) => self.parse_text(&text),
            RawFilter::Mapping(map) => self.parse_mapping(map),
        }
    }

    /// Parse a JSON document
    pub fn parse_text(&self, text: &str) -> Result<FilterInput> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QEngineError::parse("Empty filter input"));
        }

        let value: Value = serde_json::from_str(text)
            .map_err(|e| QEngineError::parse(format!("Invalid JSON in filter: {e}")))?;
        match value {
            Value::Object(map) => {
                debug!("Parsing JSON filter text");
                self.parse_object(map, false)
            }
            other => Err(QEngineError::parse(format!(
                "Filter must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Parse an already decoded mapping; string values are coerced when the
    /// mapping uses bracket notation
    pub fn parse_mapping(&self, map: Map<String, Value>) -> Result<FilterInput> {
        self.parse_object(map, true)
    }

    fn parse_object(&self, map: Map<String, Value>, coerce: bool) -> Result<FilterInput> {
        if map.len() == 1 {
            if let Some(inner) = map.get("filter") {
                match inner {
                    Value::Object(inner) => return self.parse_object(inner.clone(), coerce),
                    Value::String(text) => return self.parse_text(text),
                    _ => {}
                }
            }
        }

        let bracket_count = map.keys().filter(|k| bracket::is_bracket_key(k)).count();
        if bracket_count == 0 {
            debug!("Parsing direct filter mapping");
            return self.parse_direct(map);
        }

        if bracket_count < map.len() {
            let direct: Vec<&str> = map
                .keys()
                .filter(|k| !bracket::is_bracket_key(k))
                .map(String::as_str)
                .collect();
            if self.config.strict_mode {
                return Err(QEngineError::parse(format!(
                    "Filter mixes bracket-notation and direct keys: {}",
                    direct.join(", ")
                )));
            }
            warn!("Ignoring direct keys mixed with bracket notation: {}", direct.join(", "));
        }

        debug!("Parsing bracket-notation filter with {bracket_count} keys");
        self.parse_bracket(map, coerce)
    }

    fn parse_direct(&self, map: Map<String, Value>) -> Result<FilterInput> {
        let mut input = FilterInput::default();
        for (key, value) in map {
            self.assign_clause(&mut input, &key, value)?;
        }
        Ok(input)
    }

    fn parse_bracket(&self, map: Map<String, Value>, coerce: bool) -> Result<FilterInput> {
        let mut root = Map::new();
        for (key, value) in map {
            if !bracket::is_bracket_key(&key) {
                continue;
            }
            let path = bracket::split_key(&key)?;
            let depth = bracket::path_depth(&path);
            if depth > self.config.max_nesting_depth {
                return Err(depth_error(depth, self.config.max_nesting_depth));
            }
            let value = if coerce {
                coerce::coerce_value(value)
            } else {
                value
            };
            bracket::fold_path(&mut root, &path, value)?;
        }

        let mut input = FilterInput::default();
        for (clause, value) in root {
            let value = bracket::index_objects_to_arrays(value);
            self.assign_clause(&mut input, &clause, value)?;
        }
        Ok(input)
    }

    fn assign_clause(&self, input: &mut FilterInput, key: &str, value: Value) -> Result<()> {
        let slot = match key {
            "where" => &mut input.where_clause,
            "order" => &mut input.order,
            "fields" => &mut input.fields,
            other => {
                if self.config.strict_mode {
                    return Err(QEngineError::parse(format!(
                        "Unknown filter key '{other}'; expected one of {}",
                        CLAUSES.join(", ")
                    )));
                }
                warn!("Ignoring unknown filter key '{other}'");
                return Ok(());
            }
        };

        let depth = nesting_depth(&value);
        if depth > self.config.max_nesting_depth {
            return Err(depth_error(depth, self.config.max_nesting_depth));
        }

        *slot = match value {
            Value::Null => None,
            value => Some(value),
        };
        Ok(())
    }
}

/// Nesting depth of logical operators inside a clause value.
///
/// A key counts as one level when it names `$and`/`$or`/`$nor` in any
/// accepted spelling and holds an array. Field and operator mappings add none.
pub fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, child)| {
                let inner = nesting_depth(child);
                if child.is_array() && is_logical_key(key) {
                    inner + 1
                } else {
                    inner
                }
            })
            .max()
            .unwrap_or(0),
        Value::Array(items) => items.iter().map(nesting_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Whether `key` spells a logical operator, ignoring case
pub(crate) fn is_logical_key(key: &str) -> bool {
    matches!(canonical_operator(key, false), Some(OperatorKey::Logical(_)))
}

fn depth_error(depth: usize, max: usize) -> QEngineError {
    QEngineError::parse(format!(
        "Filter nesting depth {depth} exceeds maximum of {max}"
    ))
}

/// JSON type name used in messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
