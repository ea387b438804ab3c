//! Bracket-notation decoding
//!
//! Keys such as `filter[where][price][$gt]` are split into segment paths with
//! nom combinators and folded into one nested mapping. Objects whose keys are
//! all indexes (`[$and][0]`, `[$and][1]`) become arrays afterwards.

use nom::{
    bytes::complete::take_till,
    character::complete::char,
    combinator::all_consuming,
    multi::many0,
    sequence::{delimited, pair},
    IResult, Parser,
};
use qengine_shared::{QEngineError, Result};
use serde_json::{Map, Value};

/// Prefix dropped from every decoded path
const FILTER_PREFIX: &str = "filter";

fn segment_text(input: &str) -> IResult<&str, &str> {
    take_till(|c| c == '[' || c == ']').parse(input)
}

fn key_path(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    all_consuming(pair(
        segment_text,
        many0(delimited(char('['), segment_text, char(']'))),
    ))
    .parse(input)
}

/// Whether a key uses bracket notation
pub(crate) fn is_bracket_key(key: &str) -> bool {
    key.contains('[')
}

/// Split a bracket key into its path, dropping the `filter` prefix and empty segments
pub(crate) fn split_key(key: &str) -> Result<Vec<String>> {
    let (_, (head, segments)) = key_path(key)
        .map_err(|_| QEngineError::parse(format!("Malformed bracket key '{key}'")))?;

    let mut path: Vec<String> = std::iter::once(head)
        .chain(segments)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    if path.first().is_some_and(|first| first == FILTER_PREFIX) {
        path.remove(0);
    }

    if path.is_empty() {
        return Err(QEngineError::parse(format!(
            "Bracket key '{key}' does not name a filter clause"
        )));
    }
    Ok(path)
}

/// Logical operator levels named by a path below its clause segment
pub(crate) fn path_depth(path: &[String]) -> usize {
    path.iter()
        .skip(1)
        .filter(|segment| super::is_logical_key(segment))
        .count()
}

/// Insert `value` at `path` inside `root`, merging shared prefixes
pub(crate) fn fold_path(root: &mut Map<String, Value>, path: &[String], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match slot {
            Value::Object(map) => map,
            _ => {
                return Err(QEngineError::parse(format!(
                    "Conflicting values for '{}'",
                    path[..=depth].join(".")
                )))
            }
        };
    }

    if current.contains_key(last) {
        return Err(QEngineError::parse(format!(
            "Conflicting values for '{}'",
            path.join(".")
        )));
    }
    current.insert(last.clone(), value);
    Ok(())
}

/// Turn index-keyed objects into arrays, recursively
pub(crate) fn index_objects_to_arrays(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let all_indexes = !map.is_empty() && map.keys().all(|k| is_index(k));
            if all_indexes {
                let mut indexed: Vec<(usize, Value)> = map
                    .into_iter()
                    .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
                    .collect();
                indexed.sort_by_key(|(i, _)| *i);
                Value::Array(
                    indexed
                        .into_iter()
                        .map(|(_, v)| index_objects_to_arrays(v))
                        .collect(),
                )
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, index_objects_to_arrays(v)))
                        .collect(),
                )
            }
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(index_objects_to_arrays).collect())
        }
        other => other,
    }
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}
