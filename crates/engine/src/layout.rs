//! Display column ordering: data columns interleaved with formula columns.

use crate::document::FormulaColumn;

/// One column of the rendered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayColumn {
    /// Data column, by name.
    Data(String),
    /// Formula column, by index into the filter's formula list.
    Formula(usize),
}

/// Data columns in selection order, each followed by the formula columns
/// anchored to it (in declaration order). Formula columns with no anchor,
/// or anchored to a column that is not selected, go at the end.
pub fn display_columns(selected: &[String], formulas: &[FormulaColumn]) -> Vec<DisplayColumn> {
    let mut out = Vec::with_capacity(selected.len() + formulas.len());

    for name in selected {
        out.push(DisplayColumn::Data(name.clone()));
        for (idx, fc) in formulas.iter().enumerate() {
            if fc.insert_after_column.as_deref() == Some(name.as_str()) {
                out.push(DisplayColumn::Formula(idx));
            }
        }
    }

    for (idx, fc) in formulas.iter().enumerate() {
        let anchored = fc
            .insert_after_column
            .as_ref()
            .is_some_and(|anchor| selected.contains(anchor));
        if !anchored {
            out.push(DisplayColumn::Formula(idx));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fc(id: &str, after: Option<&str>) -> FormulaColumn {
        FormulaColumn {
            id: id.into(),
            label: id.into(),
            formula: "=1".into(),
            width: None,
            insert_after_column: after.map(str::to_string),
        }
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn anchored_formulas_follow_their_column() {
        let formulas = vec![fc("f0", Some("a")), fc("f1", None), fc("f2", Some("a")), fc("f3", Some("b"))];
        let layout = display_columns(&cols(&["a", "b", "c"]), &formulas);
        assert_eq!(
            layout,
            vec![
                DisplayColumn::Data("a".into()),
                DisplayColumn::Formula(0),
                DisplayColumn::Formula(2),
                DisplayColumn::Data("b".into()),
                DisplayColumn::Formula(3),
                DisplayColumn::Data("c".into()),
                DisplayColumn::Formula(1),
            ]
        );
    }

    #[test]
    fn unselected_anchor_appends() {
        let formulas = vec![fc("f0", Some("hidden")), fc("f1", None)];
        let layout = display_columns(&cols(&["a"]), &formulas);
        assert_eq!(
            layout,
            vec![DisplayColumn::Data("a".into()), DisplayColumn::Formula(0), DisplayColumn::Formula(1)]
        );
    }
}
