//! Best-effort typing of bracket-notation values, which always arrive as strings

use serde_json::{Number, Value};

/// Coerce a bracket-notation value. Lists are coerced element-wise; other
/// non-string values pass through untouched.
pub(crate) fn coerce_value(value: Value) -> Value {
    match value {
        Value::String(text) => coerce_str(text),
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_value).collect()),
        other => other,
    }
}

fn coerce_str(text: String) -> Value {
    match text.as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Ok(int) = text.parse::<i64>() {
        return Value::Number(int.into());
    }

    if looks_numeric(&text) {
        if let Some(number) = text.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(number);
        }
    }

    if text.starts_with('[') || text.starts_with('{') {
        if let Ok(decoded) = serde_json::from_str::<Value>(&text) {
            return decoded;
        }
    }

    Value::String(text)
}

// f64::from_str also accepts "inf", "NaN" and "infinity"
fn looks_numeric(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}
