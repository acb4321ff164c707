//! Column schema: the fixed set of typed columns a store holds.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::operator::{operators_for, OperatorKind};

/// Storage type of a column. Drives the SQL column type and which
/// operators the presenting layer offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Date,
}

impl ColumnType {
    /// SQLite column type used when creating the records table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Number => "REAL",
            ColumnType::Text | ColumnType::Date => "TEXT",
        }
    }

    /// Operators valid for this type, in presentation order.
    pub fn operators(&self) -> &'static [OperatorKind] {
        operators_for(*self)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Number => write!(f, "number"),
            ColumnType::Date => write!(f, "date"),
        }
    }
}

/// One column: storage identifier, display label, type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// Create a storage index for this column.
    #[serde(default)]
    pub indexed: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, label: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            column_type,
            indexed: false,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Ordered, validated list of column definitions.
///
/// Names are plain identifiers and unique, so they can be emitted as quoted
/// SQL identifiers without any user text reaching the query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        let mut labels = HashSet::new();
        for col in &columns {
            if !is_identifier(&col.name) {
                return Err(EngineError::InvalidColumnName(col.name.clone()));
            }
            if !seen.insert(col.name.as_str()) {
                return Err(EngineError::DuplicateColumn(col.name.clone()));
            }
            if !labels.insert(col.label.trim().to_ascii_lowercase()) {
                return Err(EngineError::DuplicateLabel(col.label.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing loudly on names outside the schema.
    pub fn require(&self, name: &str) -> Result<&ColumnDef, EngineError> {
        self.get(name)
            .ok_or_else(|| EngineError::UnknownColumn(name.to_string()))
    }

    /// Resolve a CSV header to a column by label, then by name
    /// (trimmed, case-insensitive).
    pub fn resolve_header(&self, header: &str) -> Option<&ColumnDef> {
        let key = header.trim();
        self.columns
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(key))
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(key)))
    }

    /// Display label for a column name, falling back to the name itself.
    pub fn label_of<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).map(|c| c.label.as_str()).unwrap_or(name)
    }

    /// Resolve a column selection. Empty selection means every column in
    /// schema order.
    pub fn resolve_selection(&self, selected: &[String]) -> Result<Vec<String>, EngineError> {
        if selected.is_empty() {
            return Ok(self.columns.iter().map(|c| c.name.clone()).collect());
        }
        selected
            .iter()
            .map(|name| self.require(name).map(|c| c.name.clone()))
            .collect()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Double-quote a column name for SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(vec![
            ColumnDef::new("amount", "Amount", ColumnType::Number),
            ColumnDef::new("payer", "Payer Name", ColumnType::Text),
            ColumnDef::new("due", "DueDate", ColumnType::Date),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_bad_identifiers() {
        let err = Schema::new(vec![ColumnDef::new("a b", "A", ColumnType::Text)]).unwrap_err();
        assert_eq!(err, EngineError::InvalidColumnName("a b".into()));
        let err = Schema::new(vec![ColumnDef::new("1x", "A", ColumnType::Text)]).unwrap_err();
        assert_eq!(err, EngineError::InvalidColumnName("1x".into()));
    }

    #[test]
    fn rejects_duplicates() {
        let err = Schema::new(vec![
            ColumnDef::new("a", "A", ColumnType::Text),
            ColumnDef::new("a", "B", ColumnType::Text),
        ])
        .unwrap_err();
        assert_eq!(err, EngineError::DuplicateColumn("a".into()));
        let err = Schema::new(vec![
            ColumnDef::new("a", "Payer", ColumnType::Text),
            ColumnDef::new("b", "PAYER", ColumnType::Text),
        ])
        .unwrap_err();
        assert_eq!(err, EngineError::DuplicateLabel("PAYER".into()));
    }

    #[test]
    fn header_resolution_prefers_label() {
        let schema = sample();
        assert_eq!(schema.resolve_header("  payer name ").unwrap().name, "payer");
        assert_eq!(schema.resolve_header("DUEDATE").unwrap().name, "due");
        assert_eq!(schema.resolve_header("amount").unwrap().name, "amount");
        assert!(schema.resolve_header("missing").is_none());
    }

    #[test]
    fn empty_selection_means_all() {
        let schema = sample();
        assert_eq!(schema.resolve_selection(&[]).unwrap(), vec!["amount", "payer", "due"]);
        assert_eq!(
            schema.resolve_selection(&["nope".into()]).unwrap_err(),
            EngineError::UnknownColumn("nope".into())
        );
    }

    #[test]
    fn column_type_deserializes_lowercase() {
        let def: ColumnDef =
            serde_json::from_str(r#"{"name":"a","label":"A","type":"number"}"#).unwrap();
        assert_eq!(def.column_type, ColumnType::Number);
        assert!(!def.indexed);
    }
}
