//! In-memory operator dispatch: does one value satisfy one condition?
//!
//! This is the reference semantics for every operator. The SQL compiler
//! consults it to decide how NULL storage values must be treated, so the
//! query path and the styling path agree on which rows match.

use crate::document::FilterCondition;
use crate::operator::OperatorKind;
use crate::schema::{ColumnType, Schema};
use crate::value::{CellValue, Row};

/// Test a single (possibly absent) value against an operator and its bounds.
///
/// - Absent, NULL and empty-text values compare as the empty string.
/// - Numeric operators parse both sides as floats; an unparseable side is
///   NaN and every ordered comparison against NaN is false.
/// - `contains` folds ASCII case, matching SQLite's default `LIKE`.
/// - `in`/`not_in` split the value on commas and trim each token.
/// - A missing `value2` on a range operator never matches.
/// - Unknown operators never match.
pub fn matches(operator: &OperatorKind, cell: Option<&CellValue>, value: &str, value2: Option<&str>) -> bool {
    let text = cell.map(CellValue::as_text).unwrap_or_default();
    let text = text.as_str();

    match operator {
        OperatorKind::Equals => text == value,
        OperatorKind::NotEquals => text != value,
        OperatorKind::Contains => contains_folded(text, value),
        OperatorKind::NotContains => !contains_folded(text, value),
        OperatorKind::Gt => cell_number(cell) > parse_number(value),
        OperatorKind::Gte => cell_number(cell) >= parse_number(value),
        OperatorKind::Lt => cell_number(cell) < parse_number(value),
        OperatorKind::Lte => cell_number(cell) <= parse_number(value),
        OperatorKind::Between => {
            let v = cell_number(cell);
            let high = value2.map(parse_number).unwrap_or(f64::NAN);
            v >= parse_number(value) && v <= high
        }
        OperatorKind::In => list_tokens(value).any(|t| t == text),
        OperatorKind::NotIn => !list_tokens(value).any(|t| t == text),
        OperatorKind::IsNull => cell.map_or(true, CellValue::is_blank),
        OperatorKind::IsNotNull => !cell.map_or(true, CellValue::is_blank),
        OperatorKind::DateAfter => text >= value,
        OperatorKind::DateBefore => text <= value,
        OperatorKind::DateBetween => match value2 {
            Some(high) => text >= value && text <= high,
            None => false,
        },
        OperatorKind::Unknown(_) => false,
    }
}

/// [`matches`] for a value of a known column type.
///
/// An operator outside the type's catalog never matches. Number columns
/// compare `equals`/`not_equals` numerically, so `10.0` equals a stored 10.
pub fn matches_typed(
    column_type: ColumnType,
    operator: &OperatorKind,
    cell: Option<&CellValue>,
    value: &str,
    value2: Option<&str>,
) -> bool {
    if !operator.applies_to(column_type) {
        return false;
    }
    match (column_type, operator) {
        (ColumnType::Number, OperatorKind::Equals) => number_equals(cell, value),
        (ColumnType::Number, OperatorKind::NotEquals) => !number_equals(cell, value),
        _ => matches(operator, cell, value, value2),
    }
}

/// Test a condition against a row, typing the column through `schema`.
/// Columns missing from the row are absent; columns outside the schema
/// never match.
pub fn condition_matches(schema: &Schema, condition: &FilterCondition, row: &Row) -> bool {
    schema.get(&condition.column).is_some_and(|column| {
        matches_typed(
            column.column_type,
            &condition.operator,
            row.get(&condition.column),
            &condition.value,
            condition.value2.as_deref(),
        )
    })
}

/// Float parse of user/stored text; anything non-finite or unparseable is NaN.
pub fn parse_number(s: &str) -> f64 {
    match s.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => f64::NAN,
    }
}

/// Comma-separated list tokens, trimmed.
pub fn list_tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim)
}

fn cell_number(cell: Option<&CellValue>) -> f64 {
    match cell {
        Some(v) => v.as_number().unwrap_or_else(|| parse_number(&v.as_text())),
        None => f64::NAN,
    }
}

fn number_equals(cell: Option<&CellValue>, value: &str) -> bool {
    cell_number(cell) == parse_number(value)
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn between_is_inclusive() {
        let op = OperatorKind::Between;
        for (v, expect) in [(15.0, true), (9.0, false), (20.0, true), (10.0, true), (21.0, false)] {
            assert_eq!(matches(&op, Some(&CellValue::Real(v)), "10", Some("20")), expect, "{v}");
        }
    }

    #[test]
    fn between_without_upper_bound_never_matches() {
        assert!(!matches(&OperatorKind::Between, Some(&CellValue::Real(15.0)), "10", None));
        assert!(!matches(&OperatorKind::DateBetween, Some(&text("2024-02-01")), "2024-01-01", None));
    }

    #[test]
    fn non_numeric_input_never_matches() {
        let v = CellValue::Real(5.0);
        for op in [OperatorKind::Gt, OperatorKind::Gte, OperatorKind::Lt, OperatorKind::Lte] {
            assert!(!matches(&op, Some(&v), "abc", None));
            assert!(!matches(&op, Some(&text("abc")), "1", None));
            assert!(!matches(&op, None, "1", None));
        }
        assert!(!matches(&OperatorKind::Gt, Some(&v), "inf", None));
    }

    #[test]
    fn numeric_text_cells_parse() {
        assert!(matches(&OperatorKind::Gt, Some(&text(" 12.5 ")), "12", None));
        assert!(matches(&OperatorKind::Lte, Some(&CellValue::Integer(3)), "3", None));
    }

    #[test]
    fn in_trims_tokens_and_is_case_sensitive() {
        let op = OperatorKind::In;
        assert!(matches(&op, Some(&text("A")), "A, B,C", None));
        assert!(matches(&op, Some(&text("B")), "A, B,C", None));
        assert!(matches(&op, Some(&text("C")), "A, B,C", None));
        assert!(!matches(&op, Some(&text("a")), "A, B,C", None));
        assert!(!matches(&op, Some(&text(" B")), "A, B,C", None));
        assert!(matches(&OperatorKind::NotIn, Some(&text("D")), "A, B,C", None));
        assert!(!matches(&OperatorKind::NotIn, Some(&text("A")), "A, B,C", None));
    }

    #[test]
    fn null_checks() {
        assert!(matches(&OperatorKind::IsNull, None, "", None));
        assert!(matches(&OperatorKind::IsNull, Some(&CellValue::Null), "", None));
        assert!(matches(&OperatorKind::IsNull, Some(&text("")), "", None));
        assert!(!matches(&OperatorKind::IsNull, Some(&text("x")), "", None));
        assert!(matches(&OperatorKind::IsNotNull, Some(&CellValue::Real(0.0)), "", None));
        assert!(!matches(&OperatorKind::IsNotNull, None, "", None));
    }

    #[test]
    fn contains_folds_ascii_case() {
        assert!(matches(&OperatorKind::Contains, Some(&text("Hospital Norte")), "norte", None));
        assert!(!matches(&OperatorKind::NotContains, Some(&text("Hospital Norte")), "NORTE", None));
        assert!(matches(&OperatorKind::NotContains, None, "x", None));
    }

    #[test]
    fn dates_compare_lexicographically() {
        let d = text("2024-03-15");
        assert!(matches(&OperatorKind::DateAfter, Some(&d), "2024-03-15", None));
        assert!(matches(&OperatorKind::DateBefore, Some(&d), "2024-03-15", None));
        assert!(!matches(&OperatorKind::DateAfter, Some(&d), "2024-04-01", None));
        assert!(matches(&OperatorKind::DateBetween, Some(&d), "2024-03-01", Some("2024-03-31")));
        assert!(!matches(&OperatorKind::DateAfter, None, "2024-01-01", None));
    }

    #[test]
    fn unknown_operator_never_matches() {
        let op = OperatorKind::Unknown("matches_regex".into());
        assert!(!matches(&op, Some(&text("x")), "x", None));
        assert!(!matches(&op, None, "", None));
    }

    #[test]
    fn typed_matching_rejects_foreign_operators() {
        // Numeric comparisons on text or date columns fail closed.
        assert!(!matches_typed(ColumnType::Text, &OperatorKind::Gt, Some(&text("12")), "-1", None));
        assert!(!matches_typed(ColumnType::Date, &OperatorKind::Gt, Some(&text("2024-03-15")), "2000", None));
        assert!(!matches_typed(ColumnType::Number, &OperatorKind::Contains, Some(&CellValue::Real(1.0)), "1", None));
        assert!(matches_typed(ColumnType::Text, &OperatorKind::Contains, Some(&text("abc")), "B", None));
        assert!(matches_typed(ColumnType::Date, &OperatorKind::DateAfter, Some(&text("2024-03-15")), "2024-01-01", None));
    }

    #[test]
    fn number_columns_compare_equality_numerically() {
        let ten = CellValue::Real(10.0);
        assert!(matches_typed(ColumnType::Number, &OperatorKind::Equals, Some(&ten), "10.0", None));
        assert!(!matches_typed(ColumnType::Number, &OperatorKind::NotEquals, Some(&ten), "10.0", None));
        assert!(!matches_typed(ColumnType::Number, &OperatorKind::Equals, Some(&ten), "ten", None));
        assert!(matches_typed(ColumnType::Number, &OperatorKind::NotEquals, Some(&ten), "ten", None));
        // A NULL amount equals nothing, not even the empty string.
        assert!(!matches_typed(ColumnType::Number, &OperatorKind::Equals, None, "", None));
        assert!(matches_typed(ColumnType::Number, &OperatorKind::NotEquals, None, "10", None));
    }

    #[test]
    fn schema_typed_conditions() {
        use crate::schema::ColumnDef;
        let schema = Schema::new(vec![
            ColumnDef::new("payer", "Payer", ColumnType::Text),
            ColumnDef::new("amount", "Amount", ColumnType::Number),
        ])
        .unwrap();
        let mut row = Row::new();
        row.insert("payer".into(), text("12abc"));
        row.insert("amount".into(), CellValue::Real(7.0));

        let cond = |col: &str, op, v: &str| FilterCondition::new(col, op, v);
        assert!(condition_matches(&schema, &cond("amount", OperatorKind::Equals, "7.0"), &row));
        assert!(!condition_matches(&schema, &cond("payer", OperatorKind::Gt, "-1"), &row));
        assert!(!condition_matches(&schema, &cond("ghost", OperatorKind::IsNull, ""), &row));
    }

    #[test]
    fn whole_reals_compare_as_written() {
        assert!(matches(&OperatorKind::Equals, Some(&CellValue::Real(10.0)), "10", None));
        assert!(matches(&OperatorKind::NotEquals, Some(&CellValue::Real(10.5)), "10", None));
    }
}
