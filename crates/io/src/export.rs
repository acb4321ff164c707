// CSV export

use std::io::Write;

use rowscope_engine::{Row, Schema};

use crate::store::StoreError;

pub const DEFAULT_EXPORT_DELIMITER: u8 = b';';

/// Write rows as CSV: one header row of column labels, then one record per
/// row with null cells written empty. Returns the number of data rows.
pub fn write_csv<W: Write>(
    writer: W,
    schema: &Schema,
    columns: &[String],
    rows: &[Row],
    delimiter: u8,
) -> Result<usize, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    writer.write_record(columns.iter().map(|c| schema.label_of(c)))?;
    for row in rows {
        writer.write_record(
            columns
                .iter()
                .map(|c| row.get(c).map(|v| v.as_text()).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowscope_engine::{CellValue, ColumnDef, ColumnType};

    #[test]
    fn writes_labels_and_quotes_when_needed() {
        let schema = Schema::new(vec![
            ColumnDef::new("payer", "Payer Name", ColumnType::Text),
            ColumnDef::new("amount", "Amount", ColumnType::Number),
        ])
        .unwrap();
        let columns = vec!["payer".to_string(), "amount".to_string()];
        let mut row = Row::new();
        row.insert("payer".into(), CellValue::from("Doe; Jane"));
        row.insert("amount".into(), CellValue::Real(10.0));
        let mut blank = Row::new();
        blank.insert("payer".into(), CellValue::Null);

        let mut out = Vec::new();
        let n = write_csv(&mut out, &schema, &columns, &[row, blank], b';').unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Payer Name;Amount\n\"Doe; Jane\";10\n;\n"
        );
    }
}
