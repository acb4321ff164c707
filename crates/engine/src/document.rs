//! Saved filter documents and their parts.
//!
//! Field names follow the persisted JSON shape (camelCase). Documents are
//! read-only inputs to the engine; the filter store owns their lifecycle.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EngineError;
use crate::operator::OperatorKind;
use crate::schema::Schema;

// ============================================================================
// Filter conditions
// ============================================================================

/// One typed filter condition. `value2` is only meaningful for range operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub column: String,
    pub operator: OperatorKind,
    #[serde(default, deserialize_with = "loose_string")]
    pub value: String,
    #[serde(default, deserialize_with = "loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub value2: Option<String>,
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, operator: OperatorKind, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
            value2: None,
        }
    }

    pub fn range(
        column: impl Into<String>,
        operator: OperatorKind,
        low: impl Into<String>,
        high: impl Into<String>,
    ) -> Self {
        Self {
            value2: Some(high.into()),
            ..Self::new(column, operator, low)
        }
    }
}

// ============================================================================
// Color rules
// ============================================================================

/// What a color rule paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Row,
    Cell,
}

/// Conditional styling rule. Lower `priority` wins on conflicting style keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorRule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub target_type: TargetType,
    /// Required when `target_type` is `Cell`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_column: Option<String>,
    pub condition_column: String,
    pub operator: OperatorKind,
    #[serde(default, deserialize_with = "loose_string")]
    pub value: String,
    #[serde(default, deserialize_with = "loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub value2: Option<String>,
    pub background_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default)]
    pub priority: i64,
}

impl ColorRule {
    /// The condition half of the rule, in filter-condition form.
    pub fn condition(&self) -> FilterCondition {
        FilterCondition {
            column: self.condition_column.clone(),
            operator: self.operator.clone(),
            value: self.value.clone(),
            value2: self.value2.clone(),
        }
    }
}

// ============================================================================
// Formula columns
// ============================================================================

/// Computed column. `formula` starting with `=` is evaluated per row;
/// anything else is shown literally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaColumn {
    pub id: String,
    pub label: String,
    pub formula: String,
    /// Display width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Data column this one is shown after; unset appends at the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_after_column: Option<String>,
}

impl FormulaColumn {
    pub fn is_formula(&self) -> bool {
        self.formula.starts_with('=')
    }
}

// ============================================================================
// Saved filter
// ============================================================================

/// Aggregate root: column selection, conditions, color rules and formula
/// columns saved under one id. Re-saving replaces the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFilter {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub selected_columns: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub color_rules: Vec<ColorRule>,
    #[serde(default)]
    pub formula_columns: Vec<FormulaColumn>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl SavedFilter {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            selected_columns: Vec::new(),
            conditions: Vec::new(),
            color_rules: Vec::new(),
            formula_columns: Vec::new(),
            created_at: String::new(),
            updated_at: None,
        }
    }

    /// Check every column reference against the schema.
    pub fn validate(&self, schema: &Schema) -> Result<(), EngineError> {
        for name in &self.selected_columns {
            schema.require(name)?;
        }
        for cond in &self.conditions {
            schema.require(&cond.column)?;
        }
        for rule in &self.color_rules {
            schema.require(&rule.condition_column)?;
            match (rule.target_type, &rule.target_column) {
                (TargetType::Cell, None) => {
                    return Err(EngineError::MissingTargetColumn(rule.id.clone()));
                }
                (TargetType::Cell, Some(col)) => {
                    schema.require(col)?;
                }
                (TargetType::Row, _) => {}
            }
        }
        for fc in &self.formula_columns {
            if let Some(anchor) = &fc.insert_after_column {
                schema.require(anchor)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Lenient value fields
// ============================================================================

/// Condition values were historically written as JSON strings or numbers.
fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(json_to_string(value).unwrap_or_default())
}

fn loose_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(json_to_string(value))
}

fn json_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
