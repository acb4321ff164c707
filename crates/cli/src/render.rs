// Page rendering: data + formula columns, styles, text table or JSON

use std::io::{self, Write};

use serde::Serialize;

use rowscope_engine::{
    display_columns, project_formulas, ColorRule, DisplayColumn, FormulaColumn, FormulaEngine,
    Schema, Style, StyleEvaluator, StyleResult,
};
use rowscope_io::QueryPage;

const MAX_CELL_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewColumn {
    /// Column name, or the formula column id.
    pub key: String,
    pub label: String,
    pub formula: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewRow {
    /// One printable value per view column.
    pub cells: Vec<String>,
    #[serde(skip_serializing_if = "StyleResult::is_empty")]
    pub style: StyleResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub columns: Vec<ViewColumn>,
    pub rows: Vec<ViewRow>,
}

/// Lay out one page for display: formula columns projected and interleaved
/// after their anchors, color rules evaluated per row. Rows may carry
/// columns beyond `page.columns` for the rules to read; only
/// `page.columns` are shown.
pub fn build_view<E: FormulaEngine + ?Sized>(
    engine: &E,
    schema: &Schema,
    page: &QueryPage,
    (page_no, page_size): (u64, u64),
    rules: &[ColorRule],
    formulas: &[FormulaColumn],
) -> View {
    let layout = display_columns(&page.columns, formulas);
    let computed = project_formulas(engine, &page.columns, &page.rows, formulas);
    let styles = StyleEvaluator::new(rules).with_schema(schema);

    let columns = layout
        .iter()
        .map(|col| match col {
            DisplayColumn::Data(name) => ViewColumn {
                key: name.clone(),
                label: schema.label_of(name).to_string(),
                formula: false,
            },
            DisplayColumn::Formula(idx) => ViewColumn {
                key: formulas[*idx].id.clone(),
                label: formulas[*idx].label.clone(),
                formula: true,
            },
        })
        .collect();

    let rows = page
        .rows
        .iter()
        .zip(computed)
        .map(|(row, values)| ViewRow {
            cells: layout
                .iter()
                .map(|col| match col {
                    DisplayColumn::Data(name) => {
                        row.get(name).map(|v| v.as_text()).unwrap_or_default()
                    }
                    DisplayColumn::Formula(idx) => values.get(*idx).cloned().unwrap_or_default(),
                })
                .collect(),
            style: styles.evaluate(row),
        })
        .collect();

    View {
        page: page_no,
        page_size,
        total: page.total,
        columns,
        rows,
    }
}

/// Plain-text table followed by a page footer. A `style` column appears
/// when any row on the page is painted.
pub fn write_table<W: Write>(out: &mut W, view: &View) -> io::Result<()> {
    let styled = view.rows.iter().any(|r| !r.style.is_empty());

    let mut header: Vec<String> = view.columns.iter().map(|c| c.label.clone()).collect();
    let mut body: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|r| r.cells.iter().map(|c| truncate(c)).collect())
        .collect();
    if styled {
        header.push("style".to_string());
        for (cells, row) in body.iter_mut().zip(&view.rows) {
            cells.push(describe_style(&row.style));
        }
    }

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for cells in &body {
        for (w, cell) in widths.iter_mut().zip(cells) {
            *w = (*w).max(cell.chars().count());
        }
    }

    write_line(out, &header, &widths)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_line(out, &rule, &widths)?;
    for cells in &body {
        write_line(out, cells, &widths)?;
    }

    let pages = if view.page_size == 0 { 0 } else { view.total.div_ceil(view.page_size) };
    writeln!(
        out,
        "\n{} rows on page {} of {} ({} total)",
        view.rows.len(),
        view.page,
        pages.max(1),
        view.total
    )
}

fn write_line<W: Write>(out: &mut W, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect();
    writeln!(out, "{}", line.join("  ").trim_end())
}

fn truncate(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell.to_string();
    }
    let mut s: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
    s.push('…');
    s
}

/// `row bg=#eee; amount bg=#f00 fg=#fff`
fn describe_style(style: &StyleResult) -> String {
    let mut parts = Vec::new();
    if !style.row_style.is_empty() {
        parts.push(format!("row {}", describe_keys(&style.row_style)));
    }
    for (column, cell) in &style.cell_styles {
        parts.push(format!("{column} {}", describe_keys(cell)));
    }
    parts.join("; ")
}

fn describe_keys(style: &Style) -> String {
    let mut keys = Vec::new();
    if let Some(bg) = &style.background_color {
        keys.push(format!("bg={bg}"));
    }
    if let Some(fg) = &style.color {
        keys.push(format!("fg={fg}"));
    }
    keys.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowscope_engine::{CellValue, ColumnDef, ColumnType, OperatorKind, Row, TargetType};
    use rowscope_formula::Evaluator;

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnDef::new("payer", "Payer", ColumnType::Text),
            ColumnDef::new("amount", "Amount", ColumnType::Number),
        ])
        .unwrap()
    }

    fn page() -> QueryPage {
        let rows = [("ACME", 10.0), ("Globex", 250.0)]
            .iter()
            .map(|(payer, amount)| {
                let mut row = Row::new();
                row.insert("payer".into(), CellValue::from(*payer));
                row.insert("amount".into(), CellValue::Real(*amount));
                row
            })
            .collect();
        QueryPage {
            columns: vec!["payer".into(), "amount".into()],
            rows,
            total: 2,
        }
    }

    fn big_amounts() -> ColorRule {
        ColorRule {
            id: "big".into(),
            name: "big".into(),
            target_type: TargetType::Cell,
            target_column: Some("amount".into()),
            condition_column: "amount".into(),
            operator: OperatorKind::Gt,
            value: "100".into(),
            value2: None,
            background_color: "#fdd".into(),
            text_color: None,
            priority: 1,
        }
    }

    fn doubled() -> FormulaColumn {
        FormulaColumn {
            id: "double".into(),
            label: "Double".into(),
            formula: "=B1*2".into(),
            width: None,
            insert_after_column: Some("payer".into()),
        }
    }

    #[test]
    fn view_interleaves_formulas_and_styles() {
        let view = build_view(&Evaluator::new(), &schema(), &page(), (1, 50), &[big_amounts()], &[doubled()]);
        let labels: Vec<&str> = view.columns.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Payer", "Double", "Amount"]);
        assert_eq!(view.rows[0].cells, vec!["ACME", "20", "10"]);
        assert_eq!(view.rows[1].cells, vec!["Globex", "500", "250"]);
        assert!(view.rows[0].style.is_empty());
        assert_eq!(
            view.rows[1].style.cell("amount").background_color.as_deref(),
            Some("#fdd")
        );
    }

    #[test]
    fn table_marks_styled_rows() {
        let view = build_view(&Evaluator::new(), &schema(), &page(), (1, 50), &[big_amounts()], &[]);
        let mut out = Vec::new();
        write_table(&mut out, &view).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Payer   Amount  style");
        assert_eq!(lines[2], "ACME    10");
        assert_eq!(lines[3], "Globex  250     amount bg=#fdd");
        assert!(text.ends_with("2 rows on page 1 of 1 (2 total)\n"));
    }

    #[test]
    fn json_omits_empty_styles() {
        let view = build_view(&Evaluator::new(), &schema(), &page(), (1, 50), &[], &[]);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["pageSize"], 50);
        assert!(json["rows"][0].get("style").is_none());
        assert_eq!(json["rows"][1]["cells"][1], "250");
    }

    #[test]
    fn rules_read_fetched_columns_that_are_not_shown() {
        let mut page = page();
        page.columns = vec!["payer".into()];
        let mut rule = big_amounts();
        rule.target_type = TargetType::Row;
        rule.target_column = None;

        let view = build_view(&Evaluator::new(), &schema(), &page, (1, 50), &[rule], &[]);
        assert_eq!(view.columns.len(), 1);
        assert_eq!(view.rows[0].cells, vec!["ACME"]);
        assert!(view.rows[0].style.is_empty());
        assert_eq!(view.rows[1].style.row_style.background_color.as_deref(), Some("#fdd"));
    }

    #[test]
    fn long_cells_are_truncated() {
        let long = "x".repeat(60);
        let t = truncate(&long);
        assert_eq!(t.chars().count(), MAX_CELL_WIDTH);
        assert!(t.ends_with('…'));
    }
}
