//! JSON record collections and the keys used to join them.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};
use std::{collections::HashMap, fmt, fs, path::Path};

use crate::error::{EvalError, Result};

/// One row of any input collection.
pub type Record = JsonMap<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum JoinKey {
    TrackId,
    TrackName,
}

impl JoinKey {
    pub fn field(self) -> &'static str {
        match self {
            JoinKey::TrackId => "track_id",
            JoinKey::TrackName => "track_name",
        }
    }

    /// Textual key of a record, or `None` when the field is missing or not scalar.
    pub fn key_of(self, rec: &Record) -> Option<String> {
        rec.get(self.field()).and_then(scalar_key)
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Strings and numbers both work as ids (`7` and `"7"` join).
pub fn scalar_key(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric view of a JSON value; numeric strings are accepted.
pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        _ => None,
    }
}

/// Reads a JSON array of objects. A missing file is [`EvalError::MissingInput`].
pub fn load_records(path: &Path, what: &'static str) -> Result<Vec<Record>> {
    if !path.exists() {
        return Err(EvalError::MissingInput {
            what,
            path: path.to_path_buf(),
        });
    }
    let raw = fs::read_to_string(path).map_err(|source| EvalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| EvalError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Array(items) = value else {
        return Err(EvalError::NotAnArray {
            path: path.to_path_buf(),
        });
    };

    let total = items.len();
    let records: Vec<Record> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(obj),
            _ => None,
        })
        .collect();
    if records.len() != total {
        warn!(
            "{}: skipped {} non-object entries",
            path.display(),
            total - records.len()
        );
    }
    debug!("loaded {} {what} records from {}", records.len(), path.display());
    Ok(records)
}

/// Index by join key. The first record for a key wins.
pub fn index_by_key(records: &[Record], key: JoinKey) -> HashMap<String, &Record> {
    let mut map = HashMap::with_capacity(records.len());
    for rec in records {
        let Some(k) = key.key_of(rec) else {
            continue;
        };
        if map.contains_key(&k) {
            warn!("duplicate {key} {k:?} in ground truth, keeping the first row");
            continue;
        }
        map.insert(k, rec);
    }
    map
}

/// Inner join of predictions against an indexed collection.
///
/// Returns `(prediction, matched row)` pairs plus the number of predictions
/// that had no key or no matching row.
pub fn inner_join<'p, 't>(
    predictions: &'p [Record],
    index: &HashMap<String, &'t Record>,
    key: JoinKey,
) -> (Vec<(&'p Record, &'t Record)>, usize) {
    let mut pairs = Vec::with_capacity(predictions.len());
    let mut dropped = 0;
    for pred in predictions {
        match key.key_of(pred).and_then(|k| index.get(&k)) {
            Some(row) => pairs.push((pred, *row)),
            None => dropped += 1,
        }
    }
    (pairs, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn obj(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn numeric_and_string_ids_join() {
        let a = obj(json!({"track_id": 7}));
        let b = obj(json!({"track_id": "7"}));
        assert_eq!(JoinKey::TrackId.key_of(&a), JoinKey::TrackId.key_of(&b));
        assert_eq!(JoinKey::TrackName.key_of(&a), None);
    }

    #[test]
    fn numeric_view_accepts_numeric_strings() {
        assert_eq!(as_f64(&json!(1.5)), Some(1.5));
        assert_eq!(as_f64(&json!(" 120 ")), Some(120.0));
        assert_eq!(as_f64(&json!("fast")), None);
        assert_eq!(as_f64(&Value::Null), None);
        assert_eq!(as_f64(&json!(true)), None);
    }

    #[test]
    fn first_duplicate_wins() {
        let rows = vec![
            obj(json!({"track_name": "a", "popularity": 1})),
            obj(json!({"track_name": "a", "popularity": 2})),
            obj(json!({"popularity": 3})),
        ];
        let idx = index_by_key(&rows, JoinKey::TrackName);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx["a"]["popularity"], json!(1));
    }

    #[test]
    fn loading_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_records(&dir.path().join("nope.json"), "ground truth").unwrap_err();
        assert!(matches!(err, EvalError::MissingInput { .. }));
        assert!(err.to_string().contains("ground truth"));
    }

    #[test]
    fn loading_skips_non_objects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, r#"[{"a": 1}, 3, "x", {"b": 2}]"#).unwrap();
        let rows = load_records(&path, "rows").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn loading_rejects_non_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, r#"{"a": 1}"#).unwrap();
        assert!(matches!(
            load_records(&path, "rows"),
            Err(EvalError::NotAnArray { .. })
        ));
    }
}
