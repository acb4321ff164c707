//! Formula column projection.
//!
//! A page of rows is laid out as a small grid: data columns first (A, B, ...
//! in projection order), then one column per formula column. Formula
//! templates are shifted to their row before the grid is handed to a
//! [`FormulaEngine`]. Evaluation failures become printable `#ERR: <code>`
//! markers so one bad cell never takes out the rest of the page.

use std::fmt;

use thiserror::Error;

use crate::document::FormulaColumn;
use crate::refs::shift_row_refs;
use crate::value::{format_number, CellValue, Row};

/// Prefix of every error marker written in place of a failed formula value.
pub const ERROR_MARKER: &str = "#ERR:";

/// Raw grid content.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SheetCell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    /// Formula text including the leading `=`.
    Formula(String),
}

impl SheetCell {
    /// Spreadsheet-style coercion of a stored value: blanks are empty,
    /// numeric text (decimal comma accepted) becomes a number.
    pub fn from_value(value: &CellValue) -> Self {
        match value {
            CellValue::Null => SheetCell::Empty,
            CellValue::Integer(n) => SheetCell::Number(*n as f64),
            CellValue::Real(n) => SheetCell::Number(*n),
            CellValue::Text(s) => Self::from_text(s),
        }
    }

    fn from_text(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return SheetCell::Empty;
        }
        match trimmed.replacen(',', ".", 1).parse::<f64>() {
            Ok(n) if n.is_finite() => SheetCell::Number(n),
            _ => SheetCell::Text(s.to_string()),
        }
    }
}

/// Computed value of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for SheetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetValue::Empty => Ok(()),
            SheetValue::Number(n) => f.write_str(&format_number(*n)),
            SheetValue::Text(s) => f.write_str(s),
            SheetValue::Bool(true) => f.write_str("TRUE"),
            SheetValue::Bool(false) => f.write_str("FALSE"),
        }
    }
}

/// Evaluation failure, with its spreadsheet error literal as the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("#DIV/0!")]
    DivByZero,
    #[error("#VALUE!")]
    Value,
    #[error("#REF!")]
    Ref,
    #[error("#NAME?")]
    Name(String),
    #[error("#NUM!")]
    Num,
    #[error("#ERROR! {0}")]
    Parse(String),
    #[error("#CYCLE!")]
    Cycle,
}

impl FormulaError {
    /// Short code used in error markers.
    pub fn code(&self) -> &'static str {
        match self {
            FormulaError::DivByZero => "DIV_BY_ZERO",
            FormulaError::Value => "VALUE",
            FormulaError::Ref => "REF",
            FormulaError::Name(_) => "NAME",
            FormulaError::Num => "NUM",
            FormulaError::Parse(_) => "ERROR",
            FormulaError::Cycle => "CYCLE",
        }
    }

    /// `#ERR: <code>`
    pub fn marker(&self) -> String {
        format!("{ERROR_MARKER} {}", self.code())
    }
}

/// Row-major grid handed to the formula engine. Out-of-range reads are empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    rows: Vec<Vec<SheetCell>>,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<SheetCell>>) -> Self {
        Self { rows }
    }

    pub fn get(&self, row: usize, col: usize) -> &SheetCell {
        const EMPTY: &SheetCell = &SheetCell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(EMPTY)
    }
}

/// Formula evaluator collaborator.
pub trait FormulaEngine {
    /// Evaluate the cell at `(row, col)` (zero-based). Non-formula cells
    /// evaluate to their own value.
    fn evaluate(&self, sheet: &Sheet, row: usize, col: usize) -> Result<SheetValue, FormulaError>;
}

/// Lay out `rows` as a grid: `columns` as data cells, then each formula
/// column's template shifted to the row it sits on.
pub fn build_sheet(columns: &[String], rows: &[Row], formulas: &[FormulaColumn]) -> Sheet {
    let grid = rows
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let mut cells: Vec<SheetCell> = columns
                .iter()
                .map(|name| row.get(name).map(SheetCell::from_value).unwrap_or_default())
                .collect();
            cells.extend(formulas.iter().map(|fc| template_cell(&fc.formula, row_idx)));
            cells
        })
        .collect();
    Sheet::new(grid)
}

fn template_cell(formula: &str, row_idx: usize) -> SheetCell {
    if formula.starts_with('=') {
        SheetCell::Formula(shift_row_refs(formula, row_idx))
    } else {
        SheetCell::from_text(formula)
    }
}

/// Printable formula values for each row, one entry per formula column.
pub fn project_formulas<E: FormulaEngine + ?Sized>(
    engine: &E,
    columns: &[String],
    rows: &[Row],
    formulas: &[FormulaColumn],
) -> Vec<Vec<String>> {
    if formulas.is_empty() || rows.is_empty() {
        return rows.iter().map(|_| vec![String::new(); formulas.len()]).collect();
    }

    let sheet = build_sheet(columns, rows, formulas);
    let first_formula_col = columns.len();

    (0..rows.len())
        .map(|row| {
            (0..formulas.len())
                .map(|idx| printable(engine, &sheet, row, first_formula_col + idx))
                .collect()
        })
        .collect()
}

/// Evaluate one formula against a single sample row. Literal text (no
/// leading `=`) previews as empty.
pub fn preview_formula<E: FormulaEngine + ?Sized>(
    engine: &E,
    columns: &[String],
    sample: &Row,
    formula: &str,
) -> String {
    if !formula.starts_with('=') {
        return String::new();
    }
    let preview = FormulaColumn {
        id: "_preview".to_string(),
        label: String::new(),
        formula: formula.to_string(),
        width: None,
        insert_after_column: None,
    };
    let sheet = build_sheet(columns, std::slice::from_ref(sample), std::slice::from_ref(&preview));
    printable(engine, &sheet, 0, columns.len())
}

fn printable<E: FormulaEngine + ?Sized>(engine: &E, sheet: &Sheet, row: usize, col: usize) -> String {
    match engine.evaluate(sheet, row, col) {
        Ok(value) => value.to_string(),
        Err(err) => {
            log::debug!("formula at row {row}, col {col} failed: {err}");
            err.marker()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sums the data cells of the row; fails on text.
    struct RowSum;

    impl FormulaEngine for RowSum {
        fn evaluate(&self, sheet: &Sheet, row: usize, col: usize) -> Result<SheetValue, FormulaError> {
            match sheet.get(row, col) {
                SheetCell::Formula(f) if f == "=BAD" => Err(FormulaError::Name("BAD".into())),
                SheetCell::Formula(_) => {
                    let mut total = 0.0;
                    for c in 0..col {
                        match sheet.get(row, c) {
                            SheetCell::Number(n) => total += n,
                            SheetCell::Empty => {}
                            _ => return Err(FormulaError::Value),
                        }
                    }
                    Ok(SheetValue::Number(total))
                }
                SheetCell::Text(s) => Ok(SheetValue::Text(s.clone())),
                SheetCell::Number(n) => Ok(SheetValue::Number(*n)),
                SheetCell::Empty => Ok(SheetValue::Empty),
            }
        }
    }

    fn fc(formula: &str) -> FormulaColumn {
        FormulaColumn {
            id: formula.into(),
            label: formula.into(),
            formula: formula.into(),
            width: None,
            insert_after_column: None,
        }
    }

    fn row(pairs: &[(&str, CellValue)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn coerces_like_a_spreadsheet_import() {
        assert_eq!(SheetCell::from_value(&CellValue::Null), SheetCell::Empty);
        assert_eq!(SheetCell::from_value(&"  ".into()), SheetCell::Empty);
        assert_eq!(SheetCell::from_value(&"12,5".into()), SheetCell::Number(12.5));
        assert_eq!(SheetCell::from_value(&"ACME".into()), SheetCell::Text("ACME".into()));
        assert_eq!(SheetCell::from_value(&CellValue::Integer(3)), SheetCell::Number(3.0));
    }

    #[test]
    fn templates_are_shifted_per_row() {
        let columns = vec!["a".to_string()];
        let rows = vec![row(&[("a", 1.0.into())]), row(&[("a", 2.0.into())]), row(&[("a", 3.0.into())])];
        let sheet = build_sheet(&columns, &rows, &[fc("=A1*2"), fc("note")]);
        assert_eq!(sheet.get(2, 1), &SheetCell::Formula("=A3*2".into()));
        assert_eq!(sheet.get(2, 2), &SheetCell::Text("note".into()));
        assert_eq!(sheet.get(9, 9), &SheetCell::Empty);
    }

    #[test]
    fn failures_become_markers_without_spoiling_the_row() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let rows = vec![
            row(&[("a", 1.0.into()), ("b", 2.0.into())]),
            row(&[("a", "x".into()), ("b", 2.0.into())]),
        ];
        let out = project_formulas(&RowSum, &columns, &rows, &[fc("=A1+B1"), fc("=BAD"), fc("lit")]);
        assert_eq!(out[0], vec!["3", "#ERR: NAME", "lit"]);
        assert_eq!(out[1], vec!["#ERR: VALUE", "#ERR: NAME", "lit"]);
    }

    #[test]
    fn nothing_to_project() {
        let rows = vec![Row::new(), Row::new()];
        assert_eq!(project_formulas(&RowSum, &[], &rows, &[]), vec![Vec::<String>::new(), Vec::new()]);
        assert!(project_formulas(&RowSum, &[], &[], &[fc("=1")]).is_empty());
    }

    #[test]
    fn preview_uses_one_row() {
        let columns = vec!["a".to_string()];
        let sample = row(&[("a", 4.0.into())]);
        assert_eq!(preview_formula(&RowSum, &columns, &sample, "=A1"), "4");
        assert_eq!(preview_formula(&RowSum, &columns, &sample, "A1"), "");
    }
}
