//! Order clause parsing
//!
//! Accepted shapes: `"price DESC"`, `"-price"`, `"price"`, comma separated
//! combinations (`"a ASC, -b, c"`), an array of any of those, or an object of
//! them keyed by position.

use crate::ast::OrderEntry;
use crate::parser::json_type_name;
use qengine_shared::{QEngineError, Result};
use serde_json::Value;

/// Convert any accepted order shape into canonical sort keys.
///
/// Duplicate fields are kept; removing them is the optimizer's job.
pub fn normalize_order(order: &Value) -> Result<Vec<OrderEntry>> {
    let mut entries = Vec::new();
    match order {
        Value::Null => {}
        Value::String(text) => parse_terms(text, &mut entries)?,
        Value::Array(items) => {
            for item in items {
                parse_item(item, &mut entries)?;
            }
        }
        Value::Object(map) => {
            let mut items: Vec<(&String, &Value)> = map.iter().collect();
            if map.keys().all(|k| k.parse::<usize>().is_ok()) {
                items.sort_by_key(|(k, _)| k.parse::<usize>().unwrap_or(usize::MAX));
            }
            for (_, item) in items {
                parse_item(item, &mut entries)?;
            }
        }
        other => {
            return Err(QEngineError::validation(format!(
                "Order must be a string or a list of strings, got {}",
                json_type_name(other)
            )))
        }
    }
    Ok(entries)
}

fn parse_item(item: &Value, entries: &mut Vec<OrderEntry>) -> Result<()> {
    match item {
        Value::String(text) => parse_terms(text, entries),
        other => Err(QEngineError::validation(format!(
            "Order entries must be strings, got {}",
            json_type_name(other)
        ))),
    }
}

fn parse_terms(text: &str, entries: &mut Vec<OrderEntry>) -> Result<()> {
    for term in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        entries.push(parse_term(term)?);
    }
    Ok(())
}

/// Parse one trimmed order term
pub fn parse_term(term: &str) -> Result<OrderEntry> {
    let invalid = || QEngineError::validation(format!("Invalid order specification '{term}'"));

    if let Some(field) = term.strip_prefix('-') {
        return simple_field(field.trim()).map(OrderEntry::desc).ok_or_else(invalid);
    }
    if let Some(field) = term.strip_prefix('+') {
        return simple_field(field.trim()).map(OrderEntry::asc).ok_or_else(invalid);
    }

    let mut words = term.split_whitespace();
    let field = words.next().and_then(simple_field).ok_or_else(invalid)?;
    let ascending = match words.next() {
        None => true,
        Some(direction) if direction.eq_ignore_ascii_case("asc") => true,
        Some(direction) if direction.eq_ignore_ascii_case("desc") => false,
        Some(_) => return Err(invalid()),
    };
    if words.next().is_some() {
        return Err(invalid());
    }
    Ok(OrderEntry {
        field: field.to_string(),
        ascending,
    })
}

fn simple_field(field: &str) -> Option<&str> {
    let valid = !field.is_empty()
        && !field.starts_with(['-', '+'])
        && !field.contains(char::is_whitespace);
    valid.then_some(field)
}
