//! Forgiving field decoders for imported data.
//!
//! Saved files come from older builds and hand edits. A field that cannot be
//! read falls back to its default instead of taking the whole entry with it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// A finite number from a JSON number or numeric string.
pub(crate) fn number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn to_i32(n: f64) -> i32 {
    // `as` saturates at the i32 bounds.
    n.trunc() as i32
}

/// Integer field; null, non-numeric and non-finite values become 0.
pub(crate) fn int<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).map(to_i32).unwrap_or(0))
}

/// Optional integer field; anything unreadable becomes `None`.
pub(crate) fn opt_int<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).map(to_i32))
}

/// Optional index; negative or unreadable values become `None`.
pub(crate) fn opt_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).filter(|n| *n >= 0.0).map(|n| n.trunc() as usize))
}

/// Non-negative count; negatives clamp to 0, unreadable values become 0.
pub(crate) fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).map(|n| n.max(0.0).trunc() as u32).unwrap_or(0))
}

/// Non-negative index; negatives clamp to 0, unreadable values become 0.
pub(crate) fn index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).map(|n| n.max(0.0).trunc() as usize).unwrap_or(0))
}

/// Any field with a `Default`, replaced by it when it cannot be decoded.
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    match serde_json::from_value(value) {
        Ok(decoded) => Ok(decoded),
        Err(err) => {
            warn!(error = %err, "replacing unreadable field with its default");
            Ok(T::default())
        }
    }
}

/// A list decoded element by element, skipping the ones that fail.
///
/// A value that is not a list at all reads as empty.
pub(crate) fn each<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(index, error = %err, "skipping unreadable list element");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "int")]
        hp: i32,
        #[serde(default, deserialize_with = "opt_index")]
        slot: Option<usize>,
        #[serde(default, deserialize_with = "count")]
        rounds: u32,
        #[serde(default, deserialize_with = "or_default")]
        label: String,
        #[serde(default, deserialize_with = "each")]
        values: Vec<u8>,
    }

    fn sample(value: Value) -> Sample {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_numbers_from_strings_and_decimals() {
        let s = sample(json!({"hp": "12.9", "slot": 2.5, "rounds": "3"}));
        assert_eq!(s.hp, 12);
        assert_eq!(s.slot, Some(2));
        assert_eq!(s.rounds, 3);
    }

    #[test]
    fn test_unreadable_values_fall_back() {
        let s = sample(json!({
            "hp": null,
            "slot": -1,
            "rounds": -4,
            "label": 17,
            "values": "nope"
        }));
        assert_eq!(s.hp, 0);
        assert_eq!(s.slot, None);
        assert_eq!(s.rounds, 0);
        assert_eq!(s.label, "");
        assert!(s.values.is_empty());
    }

    #[test]
    fn test_huge_numbers_saturate() {
        let s = sample(json!({"hp": 1e12, "rounds": 1e12}));
        assert_eq!(s.hp, i32::MAX);
        assert_eq!(s.rounds, u32::MAX);
    }

    #[test]
    fn test_list_keeps_readable_elements() {
        let s = sample(json!({"values": [1, "two", 3, -4, 5]}));
        assert_eq!(s.values, vec![1, 3, 5]);
    }
}
