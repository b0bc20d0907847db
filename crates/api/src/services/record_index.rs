//! Key matcher: point lookups from file-key values to API records.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use super::external_api::ApiRecord;

/// Errors raised while building the record index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("API record at position {position} is missing the key field '{field}'")]
    MissingApiKey { position: usize, field: String },
}

/// Lookup structure from normalized API-key value to the full API record.
///
/// Built once per job and owned by the engine for the job's duration.
#[derive(Debug)]
pub struct RecordIndex {
    by_key: HashMap<String, ApiRecord>,
}

impl RecordIndex {
    /// Build an index over `records` keyed by the `api_key` field.
    ///
    /// Every record must carry the key field. When two records share a key
    /// value, the later record wins; API ordering is otherwise unspecified,
    /// so this is the documented tie-break rather than an arbitrary one.
    pub fn build(records: Vec<ApiRecord>, api_key: &str) -> Result<Self, IndexError> {
        let mut by_key = HashMap::with_capacity(records.len());

        for (position, record) in records.into_iter().enumerate() {
            let key = record.get(api_key).ok_or_else(|| IndexError::MissingApiKey {
                position,
                field: api_key.to_string(),
            })?;
            by_key.insert(key_text(key), record);
        }

        Ok(Self { by_key })
    }

    /// Look up the record matching a file-side key value.
    pub fn lookup(&self, value: &str) -> Option<&ApiRecord> {
        self.by_key.get(value.trim())
    }

    /// Number of distinct key values in the index.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Normalize a JSON value into the string form used for key comparison.
///
/// Strings are trimmed; numbers and booleans use their canonical display
/// form, so a file-side `"7"` matches an API-side integer `7`.
pub fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Render a JSON value as a CSV cell.
///
/// Nulls become empty cells; nested arrays/objects are carried opaquely as
/// compact JSON text.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<ApiRecord> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_build_and_lookup() {
        let index = RecordIndex::build(
            records(json!([
                {"userId": 1, "email": "a@x.com"},
                {"userId": 3, "email": "c@x.com"}
            ])),
            "userId",
        )
        .unwrap();

        assert_eq!(index.len(), 2);
        let record = index.lookup("1").unwrap();
        assert_eq!(record["email"], json!("a@x.com"));
        assert!(index.lookup("2").is_none());
    }

    #[test]
    fn test_numeric_api_key_matches_textual_file_key() {
        let index =
            RecordIndex::build(records(json!([{"id": 7, "v": "x"}])), "id").unwrap();

        assert!(index.lookup("7").is_some());
        assert!(index.lookup(" 7 ").is_some());
    }

    #[test]
    fn test_string_keys_are_trimmed() {
        let index =
            RecordIndex::build(records(json!([{"id": "  abc ", "v": 1}])), "id").unwrap();

        assert!(index.lookup("abc").is_some());
        assert!(index.lookup("  abc").is_some());
    }

    #[test]
    fn test_missing_key_field_fails() {
        let err = RecordIndex::build(
            records(json!([{"id": 1}, {"other": 2}])),
            "id",
        )
        .unwrap_err();

        let IndexError::MissingApiKey { position, field } = err;
        assert_eq!(position, 1);
        assert_eq!(field, "id");
    }

    #[test]
    fn test_duplicate_keys_last_record_wins() {
        let index = RecordIndex::build(
            records(json!([
                {"id": 1, "v": "first"},
                {"id": 1, "v": "second"}
            ])),
            "id",
        )
        .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("1").unwrap()["v"], json!("second"));
    }

    #[test]
    fn test_key_text_forms() {
        assert_eq!(key_text(&json!("  x  ")), "x");
        assert_eq!(key_text(&json!(7)), "7");
        assert_eq!(key_text(&json!(7.5)), "7.5");
        assert_eq!(key_text(&json!(true)), "true");
        assert_eq!(key_text(&Value::Null), "null");
    }

    #[test]
    fn test_cell_text_forms() {
        assert_eq!(cell_text(&Value::Null), "");
        assert_eq!(cell_text(&json!("plain")), "plain");
        assert_eq!(cell_text(&json!(42)), "42");
        assert_eq!(cell_text(&json!(false)), "false");
        assert_eq!(cell_text(&json!({"a": 1})), "{\"a\":1}");
        assert_eq!(cell_text(&json!([1, 2])), "[1,2]");
    }
}
