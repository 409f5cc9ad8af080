// ============================================================
// Record Domain Type
// ============================================================
// One row of raw tabular data: a mapping from field name to a
// JSON-typed value. Every ingestion reader (spreadsheet, CSV,
// line-delimited JSON) normalizes into this one shape, so the
// rest of the pipeline never knows which format a row came from.
//
// Records are immutable once ingested; the pipeline only reads
// named fields out of them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single raw data row with named fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from (name, value) pairs.
    /// Accepts &str or String names so call sites stay terse.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { fields }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Read a field as text. Numbers and booleans are rendered
    /// to their display form so a numeric CSV column can still
    /// feed a text field.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Read a field as a boolean flag. Accepts JSON booleans,
    /// the strings "true"/"false" (any case) and "1"/"0", and
    /// the numbers 1/0 — spreadsheet and CSV sources have no
    /// native boolean cell type.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.fields.get(name)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// True if any record in the slice carries the named field.
pub fn column_present(records: &[Record], name: &str) -> bool {
    records.iter().any(|r| r.has(name))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_coerces_scalar_types() {
        let r = Record::from_pairs([("a", Value::from("hi")), ("b", Value::from(7))]);
        assert_eq!(r.text("a").as_deref(), Some("hi"));
        assert_eq!(r.text("b").as_deref(), Some("7"));
        assert_eq!(r.text("missing"), None);
    }

    #[test]
    fn test_flag_parses_common_encodings() {
        let r = Record::from_pairs([
            ("a", Value::from(true)),
            ("b", Value::from("True")),
            ("c", Value::from("0")),
            ("d", Value::from(1)),
            ("e", Value::from("maybe")),
        ]);
        assert_eq!(r.flag("a"), Some(true));
        assert_eq!(r.flag("b"), Some(true));
        assert_eq!(r.flag("c"), Some(false));
        assert_eq!(r.flag("d"), Some(true));
        assert_eq!(r.flag("e"), None);
    }

    #[test]
    fn test_column_present() {
        let rows = vec![
            Record::from_pairs([("text", "x")]),
            Record::from_pairs([("text", "y"), ("is_valid", "true")]),
        ];
        assert!(column_present(&rows, "is_valid"));
        assert!(!column_present(&rows, "summary"));
    }
}
