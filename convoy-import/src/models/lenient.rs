//! Forgiving serde decoders for vendor-exported JSON
//!
//! Export pre-passes (CSV/XML → JSON) are loose about types: identifiers come
//! out as numbers or strings, empty columns as `null`, dates as epoch numbers
//! or formatted strings. These helpers accept all of those shapes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Treat `null` like a missing field
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// String or number → `Option<String>`; empty strings become `None`
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}

/// List of strings where numbers are stringified and nulls dropped
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

/// Integer or numeric string → `Option<i64>`
pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_i64))
}

/// Epoch millis as number, numeric string or date string; unusable → now
pub fn millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| match v {
            Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| parse_date_millis(s)),
            other => value_to_i64(other),
        })
        .unwrap_or_else(convoy_common::time::now_millis))
}

/// JSON scalar → non-empty string
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JSON scalar → integer (floats truncated)
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Parse a vendor date string into epoch millis
///
/// Accepts RFC 3339, RFC 2822 and naive `YYYY-MM-DD HH:MM:SS` (read as UTC).
pub fn parse_date_millis(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// A field that is sometimes a single object and sometimes a list
///
/// XML exports collapse one-element collections into a bare object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    // Tried first: derived structs also accept sequences
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_rfc3339() {
        assert_eq!(
            parse_date_millis("2020-01-01T00:00:00Z"),
            Some(1_577_836_800_000)
        );
        assert_eq!(
            parse_date_millis("2020-01-01T01:00:00+01:00"),
            Some(1_577_836_800_000)
        );
    }

    #[test]
    fn test_parse_date_rfc2822_and_naive() {
        assert_eq!(
            parse_date_millis("Wed, 01 Jan 2020 00:00:00 +0000"),
            Some(1_577_836_800_000)
        );
        assert_eq!(
            parse_date_millis("2020-01-01 00:00:00"),
            Some(1_577_836_800_000)
        );
    }

    #[test]
    fn test_parse_date_garbage() {
        assert_eq!(parse_date_millis(""), None);
        assert_eq!(parse_date_millis("yesterday"), None);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(value_to_string(&serde_json::json!(42)), Some("42".to_string()));
        assert_eq!(value_to_string(&serde_json::json!("")), None);
        assert_eq!(value_to_i64(&serde_json::json!("17")), Some(17));
        assert_eq!(value_to_i64(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_one_or_many() {
        let one: OneOrMany<u32> = serde_json::from_value(serde_json::json!(3)).unwrap();
        let many: OneOrMany<u32> = serde_json::from_value(serde_json::json!([1, 2])).unwrap();
        assert_eq!(one.into_vec(), vec![3]);
        assert_eq!(many.into_vec(), vec![1, 2]);
    }
}
