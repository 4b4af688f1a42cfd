//! Scalar values and the uniform tabular result shape

use serde::{Deserialize, Serialize};

/// A single scalar value in a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Textual view of the value, decoding blobs as lossy UTF-8
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}

impl From<rusqlite::types::Value> for Value {
    fn from(v: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value as Sq;
        match v {
            Sq::Null => Value::Null,
            Sq::Integer(i) => Value::Integer(i),
            Sq::Real(r) => Value::Real(r),
            Sq::Text(s) => Value::Text(s),
            Sq::Blob(b) => Value::Blob(b),
        }
    }
}

impl From<Value> for rusqlite::types::Value {
    fn from(v: Value) -> Self {
        use rusqlite::types::Value as Sq;
        match v {
            Value::Null => Sq::Null,
            Value::Integer(i) => Sq::Integer(i),
            Value::Real(r) => Sq::Real(r),
            Value::Text(s) => Sq::Text(s),
            Value::Blob(b) => Sq::Blob(b),
        }
    }
}

/// Uniform column/row result for any executed statement
///
/// Invariant: every row has exactly `columns.len()` values. A statement that
/// produced no result set is represented as an empty column list with zero
/// rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TabularResult {
    /// An empty result (no result set)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Append a row, enforcing the row-length invariant
    pub fn push_row(&mut self, row: Vec<Value>) {
        assert_eq!(
            row.len(),
            self.columns.len(),
            "row length must match column count"
        );
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by name, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}
