//! Utility functions for lenient JSON value handling.

use serde_json::Value;

/// Coerce a loosely typed JSON value to a number.
///
/// Accepts numbers, numeric strings (surrounding whitespace ignored) and
/// booleans (`true` = 1). Everything else yields `None`.
///
/// # Examples
///
/// ```
/// use aircon_core::util::coerce_number;
/// use serde_json::json;
///
/// assert_eq!(coerce_number(&json!(2)), Some(2.0));
/// assert_eq!(coerce_number(&json!(" 2.5 ")), Some(2.5));
/// assert_eq!(coerce_number(&json!("two")), None);
/// assert_eq!(coerce_number(&json!(null)), None);
/// ```
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
