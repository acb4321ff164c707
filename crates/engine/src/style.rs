//! Style rule evaluator: color rules + one row -> row style and cell styles.
//!
//! The lowest `priority` value that matches owns every key it sets: rules
//! are applied from the highest priority value down, each matching rule's
//! colors overwriting what earlier rules set on the same target. Ties keep
//! the rules' original sequence order (the later rule in the sequence wins).

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::document::{ColorRule, TargetType};
use crate::matcher;
use crate::schema::Schema;
use crate::value::Row;

/// Presentation keys a rule can set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    /// Text color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Style {
    pub fn is_empty(&self) -> bool {
        self.background_color.is_none() && self.color.is_none()
    }

    /// Overwrite every key `other` sets.
    pub fn merge(&mut self, other: &Style) {
        if other.background_color.is_some() {
            self.background_color = other.background_color.clone();
        }
        if other.color.is_some() {
            self.color = other.color.clone();
        }
    }

    fn from_rule(rule: &ColorRule) -> Self {
        Self {
            background_color: Some(rule.background_color.clone()),
            color: rule.text_color.clone(),
        }
    }
}

/// Effective styles for one row.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleResult {
    pub row_style: Style,
    /// Column name -> style, only for cells some rule painted.
    pub cell_styles: BTreeMap<String, Style>,
}

impl StyleResult {
    pub fn is_empty(&self) -> bool {
        self.row_style.is_empty() && self.cell_styles.is_empty()
    }

    /// Style for a cell: the row style with any cell override merged on top.
    pub fn cell(&self, column: &str) -> Style {
        let mut style = self.row_style.clone();
        if let Some(cell) = self.cell_styles.get(column) {
            style.merge(cell);
        }
        style
    }
}

/// Rules pre-sorted for repeated evaluation across a page of rows.
#[derive(Debug, Clone)]
pub struct StyleEvaluator<'a> {
    ordered: Vec<&'a ColorRule>,
    schema: Option<&'a Schema>,
}

impl<'a> StyleEvaluator<'a> {
    pub fn new(rules: &'a [ColorRule]) -> Self {
        let mut ordered: Vec<&ColorRule> = rules.iter().collect();
        // Stable: equal priorities keep sequence order.
        ordered.sort_by_key(|r| Reverse(r.priority));
        Self { ordered, schema: None }
    }

    /// Type rule conditions through `schema`, the way the query path does:
    /// operators foreign to the column type and columns outside the schema
    /// never match.
    pub fn with_schema(mut self, schema: &'a Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    fn rule_matches(&self, rule: &ColorRule, row: &Row) -> bool {
        let cell = row.get(&rule.condition_column);
        match self.schema {
            Some(schema) => schema.get(&rule.condition_column).is_some_and(|column| {
                matcher::matches_typed(
                    column.column_type,
                    &rule.operator,
                    cell,
                    &rule.value,
                    rule.value2.as_deref(),
                )
            }),
            None => matcher::matches(&rule.operator, cell, &rule.value, rule.value2.as_deref()),
        }
    }

    pub fn evaluate(&self, row: &Row) -> StyleResult {
        let mut result = StyleResult::default();

        for rule in &self.ordered {
            if !self.rule_matches(rule, row) {
                continue;
            }

            let style = Style::from_rule(rule);
            match (rule.target_type, &rule.target_column) {
                (TargetType::Row, _) => result.row_style.merge(&style),
                (TargetType::Cell, Some(column)) => {
                    result.cell_styles.entry(column.clone()).or_default().merge(&style);
                }
                // Cell rule without a target paints nothing.
                (TargetType::Cell, None) => {}
            }
        }

        result
    }
}

/// Condition columns the rules read, first-use order, without repeats. A
/// page query must fetch these for the rules to see real values.
pub fn condition_columns(rules: &[ColorRule]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for rule in rules {
        if !columns.contains(&rule.condition_column) {
            columns.push(rule.condition_column.clone());
        }
    }
    columns
}

/// Evaluate `rules` against one row.
pub fn evaluate_style(row: &Row, rules: &[ColorRule]) -> StyleResult {
    StyleEvaluator::new(rules).evaluate(row)
}
