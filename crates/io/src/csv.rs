// CSV import

use std::io::Read;
use std::path::Path;

use crate::store::StoreError;

/// A parsed CSV file: the header row and the data rows below it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn read_csv(path: &Path) -> Result<CsvTable, StoreError> {
    let content = read_file_as_utf8(path)?;
    parse_csv(&content)
}

/// Parse CSV text with a sniffed delimiter. Fields are trimmed, blank lines
/// are dropped and ragged rows are kept as-is.
pub fn parse_csv(content: &str) -> Result<CsvTable, StoreError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let delimiter = sniff_delimiter(content);
    log::debug!("sniffed CSV delimiter {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    if records.len() < 2 {
        return Err(StoreError::TooFewRecords);
    }
    let rows = records.split_off(1);
    let headers = records.pop().unwrap_or_default();
    Ok(CsvTable { headers, rows })
}

/// Delimiters tried on import, in tie-break order.
const DELIMITERS: [u8; 4] = [b';', b'\t', b',', b'|'];

/// Guess the field delimiter from the first ten non-blank lines.
///
/// A candidate scores the number of lines whose field count equals the
/// header's, times that count; a header that does not split scores zero.
/// Highest score wins, `,` when nothing splits.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(10)
        .collect();

    let mut best = (0usize, b',');
    for delimiter in DELIMITERS {
        let score = match sample.split_first() {
            Some((header, rest)) => {
                let width = field_count(header, delimiter);
                if width < 2 {
                    0
                } else {
                    let agreeing = 1 + rest.iter().filter(|l| field_count(l, delimiter) == width).count();
                    agreeing * width
                }
            }
            None => 0,
        };
        if score > best.0 {
            best = (score, delimiter);
        }
    }
    best.1
}

/// Fields in one line under `delimiter`, honouring quotes.
fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |record| record.len())
}

/// Read file and convert to UTF-8 if needed (Windows-1252 is the usual
/// encoding of spreadsheet-exported CSVs).
pub fn read_file_as_utf8(path: &Path) -> Result<String, StoreError> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            log::info!("{} is not UTF-8; decoding as Windows-1252", path.display());
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}
