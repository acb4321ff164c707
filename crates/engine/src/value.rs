//! Stored cell values and rows as read back from the record store.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A stored value. Mirrors SQLite storage classes (blobs are never written).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Absent or empty text. This is the "null" of the match operators.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Printable form used for string comparison and CSV export.
    /// Null prints as the empty string; whole reals print without a
    /// fractional part (`10.0` -> `10`).
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Integer(n) => n.to_string(),
            CellValue::Real(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Integer(n) => Some(*n as f64),
            CellValue::Real(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Real(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Integer(n)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// One record: column name -> value, in projection order.
pub type Row = IndexMap<String, CellValue>;

/// Format a number the way it was most likely written in the source CSV.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_forms() {
        assert_eq!(CellValue::Null.as_text(), "");
        assert_eq!(CellValue::Real(10.0).as_text(), "10");
        assert_eq!(CellValue::Real(-2.5).as_text(), "-2.5");
        assert_eq!(CellValue::Integer(7).as_text(), "7");
        assert_eq!(CellValue::from("x").as_text(), "x");
    }

    #[test]
    fn blank_covers_null_and_empty_text() {
        assert!(CellValue::Null.is_blank());
        assert!(CellValue::from("").is_blank());
        assert!(!CellValue::from(" ").is_blank());
        assert!(!CellValue::Real(0.0).is_blank());
    }

    #[test]
    fn serializes_as_plain_json() {
        let mut row = Row::new();
        row.insert("a".into(), CellValue::Null);
        row.insert("b".into(), CellValue::Real(1.5));
        row.insert("c".into(), CellValue::from("x"));
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"a":null,"b":1.5,"c":"x"}"#);
    }
}
