//! Reference evaluator used to check that optimized ASTs select the same records

#![allow(dead_code)]

use qengine_core::{ComparisonOperator, ConditionNode, FieldCondition, LogicalOperator};
use regex::Regex;
use serde_json::{json, Value};
use std::cmp::Ordering;

/// Sample records covering numbers, strings, floats and missing fields
pub fn sample_records() -> Vec<Value> {
    vec![
        json!({"a": 1, "b": "a", "c": 3}),
        json!({"a": 3, "b": "b"}),
        json!({"a": "b", "b": 2, "c": 0}),
        json!({"a": 5, "c": "c"}),
        json!({}),
        json!({"a": 0, "b": "c", "c": 5}),
        json!({"a": 2.5, "b": "ab", "c": 4}),
        json!({"a": 4, "b": "ba", "c": 1, "tags": ["x", "y"]}),
    ]
}

/// Whether `record` satisfies `node`
pub fn evaluate(node: &ConditionNode, record: &Value) -> bool {
    match node {
        ConditionNode::Field(cond) => evaluate_field(cond, record),
        ConditionNode::Logical(logical) => {
            let mut results = logical.children.iter().map(|child| evaluate(child, record));
            match logical.operator {
                LogicalOperator::And => results.all(|r| r),
                LogicalOperator::Or => results.any(|r| r),
                LogicalOperator::Nor => !results.any(|r| r),
            }
        }
    }
}

/// Indexes of the records selected by `node`
pub fn select(node: Option<&ConditionNode>, records: &[Value]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| node.map_or(true, |n| evaluate(n, record)))
        .map(|(i, _)| i)
        .collect()
}

fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |current, segment| current.get(segment))
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    compare(left, right).map_or(left == right, Ordering::is_eq)
}

fn evaluate_field(cond: &FieldCondition, record: &Value) -> bool {
    let actual = lookup(record, &cond.field);
    let expected = &cond.value;
    match cond.operator {
        ComparisonOperator::Exists => actual.is_some() == expected.as_bool().unwrap_or(true),
        ComparisonOperator::Ne => !actual.is_some_and(|v| loosely_equal(v, expected)),
        ComparisonOperator::Nin => !actual.is_some_and(|v| contains(expected, v)),
        _ => {
            let Some(actual) = actual else {
                return false;
            };
            match cond.operator {
                ComparisonOperator::Eq => loosely_equal(actual, expected),
                ComparisonOperator::Gt => compare(actual, expected) == Some(Ordering::Greater),
                ComparisonOperator::Gte => {
                    matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal))
                }
                ComparisonOperator::Lt => compare(actual, expected) == Some(Ordering::Less),
                ComparisonOperator::Lte => {
                    matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal))
                }
                ComparisonOperator::In => contains(expected, actual),
                ComparisonOperator::Regex => match (actual, expected) {
                    (Value::String(text), Value::String(pattern)) => {
                        Regex::new(pattern).is_ok_and(|re| re.is_match(text))
                    }
                    _ => false,
                },
                ComparisonOperator::Size => match actual {
                    Value::Array(items) => expected.as_u64() == Some(items.len() as u64),
                    _ => false,
                },
                ComparisonOperator::Type => expected.as_str() == Some(type_name(actual)),
                ComparisonOperator::Exists
                | ComparisonOperator::Ne
                | ComparisonOperator::Nin => unreachable!(),
            }
        }
    }
}

fn contains(list: &Value, item: &Value) -> bool {
    list.as_array()
        .is_some_and(|items| items.iter().any(|candidate| loosely_equal(candidate, item)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
