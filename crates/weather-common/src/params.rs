//! Flat parameter transforms.
//!
//! The orchestrator exchanges parameters as a single-level map with dotted
//! keys, while queries are nested records:
//!
//! ```text
//! {"variable": "temperature", "location.latitude": 37.0, "location.longitude": -122.0}
//!                              <=>
//! {"variable": "temperature", "location": {"latitude": 37.0, "longitude": -122.0}}
//! ```
//!
//! Leaves are any non-object value, or an empty object. Whenever `flatten`
//! succeeds, `unflatten(flatten(r)) == r`.

use serde_json::{Map, Value};

use crate::error::{CatalogError, Result};

/// Separator between nested keys in a flat parameter map.
pub const KEY_SEPARATOR: char = '.';

/// A nested parameter record.
pub type Record = Map<String, Value>;

/// A flat, dotted-key parameter map.
pub type FlatParams = Map<String, Value>;

/// Flatten a nested record into dotted keys.
///
/// Fails if a record key is empty or contains the separator, since neither
/// would survive [`unflatten`].
pub fn flatten(record: &Record) -> Result<FlatParams> {
    let mut flat = Map::new();
    flatten_into(&mut flat, None, record)?;
    Ok(flat)
}

fn flatten_into(flat: &mut FlatParams, prefix: Option<&str>, record: &Record) -> Result<()> {
    for (key, value) in record {
        if key.is_empty() || key.contains(KEY_SEPARATOR) {
            return Err(CatalogError::validation(format!(
                "record key '{}' must be non-empty and contain no '{}'",
                key, KEY_SEPARATOR
            )));
        }

        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, KEY_SEPARATOR, key),
            None => key.clone(),
        };

        match value {
            Value::Object(inner) if !inner.is_empty() => {
                flatten_into(flat, Some(&path), inner)?
            }
            other => {
                flat.insert(path, other.clone());
            }
        }
    }
    Ok(())
}

/// Check a set of dotted keys for empty segments and leaf/prefix conflicts.
///
/// `contains` reports whether a key is present in the same set.
pub(crate) fn check_flat_keys<'a>(
    keys: impl IntoIterator<Item = &'a String>,
    contains: impl Fn(&str) -> bool,
) -> Result<()> {
    for key in keys {
        if key.split(KEY_SEPARATOR).any(str::is_empty) {
            return Err(CatalogError::validation(format!(
                "parameter key '{}' has an empty segment",
                key
            )));
        }

        for (idx, _) in key.match_indices(KEY_SEPARATOR) {
            let prefix = &key[..idx];
            if contains(prefix) {
                return Err(CatalogError::validation(format!(
                    "parameter '{}' is both a value and the parent of '{}'",
                    prefix, key
                )));
            }
        }
    }
    Ok(())
}

/// Rebuild the nested record from a flat parameter map.
///
/// Fails if a key has an empty segment (`"a..b"`, `".a"`) or if one key is
/// both a leaf and the prefix of another (`"a"` and `"a.b"`).
pub fn unflatten(flat: &FlatParams) -> Result<Record> {
    check_flat_keys(flat.keys(), |key| flat.contains_key(key))?;

    let mut root = Map::new();
    for (key, value) in flat {
        let mut segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let leaf = segments.pop().unwrap_or_default();

        let mut current = &mut root;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                // Unreachable after the prefix check above.
                _ => {
                    return Err(CatalogError::validation(format!(
                        "parameter '{}' conflicts with '{}'",
                        segment, key
                    )))
                }
            };
        }

        current.insert(leaf.to_string(), value.clone());
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_flatten_nested() {
        let record = as_map(json!({
            "foo": "bar",
            "baz": {"qux": "quux", "quz": "quuz"},
        }));

        let flat = flatten(&record).unwrap();
        assert_eq!(
            Value::Object(flat),
            json!({"foo": "bar", "baz.qux": "quux", "baz.quz": "quuz"})
        );
    }

    #[test]
    fn test_unflatten_nested() {
        let flat = as_map(json!({
            "foo": "bar",
            "baz.qux": "quux",
            "baz.quz": "quuz",
        }));

        let record = unflatten(&flat).unwrap();
        assert_eq!(
            Value::Object(record),
            json!({"foo": "bar", "baz": {"qux": "quux", "quz": "quuz"}})
        );
    }

    #[test]
    fn test_round_trip_deeply_nested() {
        let record = as_map(json!({
            "a": {"b": {"c": {"d": 1, "e": [1, 2, 3]}}, "f": null},
            "g": true,
            "h": 2.5,
            "empty": {},
            "location": {"latitude": 37.0, "longitude": -122.0},
        }));

        let flat = flatten(&record).unwrap();
        assert_eq!(flat.get("a.b.c.d"), Some(&json!(1)));
        assert_eq!(flat.get("empty"), Some(&json!({})));
        assert_eq!(unflatten(&flat).unwrap(), record);
    }

    #[test]
    fn test_round_trip_flat_record_is_identity() {
        let record = as_map(json!({"x": 1, "y": "two"}));
        assert_eq!(flatten(&record).unwrap(), record);
        assert_eq!(unflatten(&record).unwrap(), record);
    }

    #[test]
    fn test_unflatten_rejects_leaf_prefix_conflict() {
        let flat = as_map(json!({"a": 1, "a.b": 2}));
        assert!(matches!(unflatten(&flat), Err(CatalogError::Validation(_))));

        let flat = as_map(json!({"a.b": 1, "a.b.c": 2}));
        assert!(matches!(unflatten(&flat), Err(CatalogError::Validation(_))));
    }

    #[test]
    fn test_unflatten_rejects_empty_segment() {
        for key in ["a..b", ".a", "a."] {
            let mut flat = Map::new();
            flat.insert(key.to_string(), json!(1));
            assert!(
                matches!(unflatten(&flat), Err(CatalogError::Validation(_))),
                "key {key} should be rejected"
            );
        }
    }

    #[test]
    fn test_flatten_rejects_keys_that_cannot_round_trip() {
        for record in [json!({"": 1}), json!({"a": {"": 1}}), json!({"a.b": 1})] {
            let record = as_map(record);
            assert!(
                matches!(flatten(&record), Err(CatalogError::Validation(_))),
                "record {record:?} should be rejected"
            );
        }
    }
}
