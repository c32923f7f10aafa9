//! Forgiving (de)serializers for catalog fields.
//!
//! Catalog files are hand-edited and produced by several scripts, so a field
//! with the wrong JSON type degrades to "absent" instead of failing the whole
//! load. Empty strings are absent too.

use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

use crate::models::product::ProductFormat;

pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string).unwrap_or_default())
}

pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(scalar_to_string)
        .filter(|s| !s.trim().is_empty()))
}

pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_number))
}

pub fn opt_format<'de, D>(deserializer: D) -> Result<Option<ProductFormat>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ProductFormat::parse))
}

/// Writes `None` as `""` so every record carries the same keys.
pub fn empty_if_none<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or_default())
}

pub fn format_or_empty<S>(value: &Option<ProductFormat>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.map(ProductFormat::as_str).unwrap_or_default())
}

/// String form of a scalar JSON value; arrays, objects and null yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Finite number from a JSON number or a numeric string.
pub fn value_to_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_to_number() {
        assert_eq!(value_to_number(&json!(10)), Some(10.0));
        assert_eq!(value_to_number(&json!(" 9.5 ")), Some(9.5));
        assert_eq!(value_to_number(&json!("ten")), None);
        assert_eq!(value_to_number(&json!("NaN")), None);
        assert_eq!(value_to_number(&json!(null)), None);
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&json!("x")).as_deref(), Some("x"));
        assert_eq!(scalar_to_string(&json!(42)).as_deref(), Some("42"));
        assert_eq!(scalar_to_string(&json!(["x"])), None);
    }
}
