//! Row-relative reference shifting for formula templates.
//!
//! A formula column holds one template written against row 1. Before row
//! `i` (zero-based) is evaluated, every relative row number in the template
//! is moved down by `i`, as if the formula had been filled down.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// `$A1`, `AB12`, `A$1`: optional column anchor, 1-3 letters, optional row
/// anchor, digits.
static CELL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)([A-Z]{1,3})(\$?)([0-9]+)").expect("valid cell reference regex"));

/// Shift relative row references in `formula` by `offset` rows.
///
/// Text that does not start with `=` is a literal and comes back untouched.
/// String literals, row-anchored references (`A$1`) and letter-digit runs
/// that are part of a longer identifier (`LOG10(`, `XYZA1`) are preserved.
pub fn shift_row_refs(formula: &str, offset: usize) -> String {
    if !formula.starts_with('=') || offset == 0 {
        return formula.to_string();
    }

    let mut out = String::with_capacity(formula.len() + 8);
    let mut rest = formula;
    loop {
        match rest.find('"') {
            Some(open) => {
                out.push_str(&shift_segment(&rest[..open], offset));
                let literal = &rest[open..];
                let close = literal_end(literal);
                out.push_str(&literal[..close]);
                rest = &literal[close..];
            }
            None => {
                out.push_str(&shift_segment(rest, offset));
                break;
            }
        }
    }
    out
}

/// Byte length of the string literal at the start of `s` (opening quote
/// included). `""` inside a literal is an escaped quote. An unterminated
/// literal runs to the end.
fn literal_end(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn shift_segment(segment: &str, offset: usize) -> String {
    CELL_REF
        .replace_all(segment, |caps: &Captures| {
            let Some(m) = caps.get(0) else {
                return String::new();
            };
            let whole = m.as_str();

            let before = segment[..m.start()].chars().next_back();
            let after = segment[m.end()..].chars().next();
            let embedded = before.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                || after.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '(');
            if embedded || &caps[3] == "$" {
                return whole.to_string();
            }

            match caps[4].parse::<usize>() {
                Ok(row) => format!("{}{}{}", &caps[1], &caps[2], row.saturating_add(offset)),
                Err(_) => whole.to_string(),
            }
        })
        .into_owned()
}

/// Spreadsheet column letters for a zero-based index (0 = A, 26 = AA).
pub fn column_letter(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (idx % 26) as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_relative_rows() {
        assert_eq!(shift_row_refs("=A1+B1", 2), "=A3+B3");
        assert_eq!(shift_row_refs("=SUM(A1:C1)*2", 9), "=SUM(A10:C10)*2");
        assert_eq!(shift_row_refs("=$A1", 1), "=$A2");
    }

    #[test]
    fn offset_zero_is_identity() {
        assert_eq!(shift_row_refs("=A1*B1", 0), "=A1*B1");
    }

    #[test]
    fn literals_are_untouched() {
        assert_eq!(shift_row_refs("A1+B1", 4), "A1+B1");
        assert_eq!(shift_row_refs(r#"=IF(A1>0,"B2","C3 ""D4""")&E1"#, 1), r#"=IF(A2>0,"B2","C3 ""D4""")&E2"#);
    }

    #[test]
    fn anchored_rows_stay_put() {
        assert_eq!(shift_row_refs("=A$1+$B$2+C3", 5), "=A$1+$B$2+C8");
    }

    #[test]
    fn identifiers_are_not_references() {
        assert_eq!(shift_row_refs("=LOG10(A1)", 1), "=LOG10(A2)");
        assert_eq!(shift_row_refs("=ABCD1+A1", 1), "=ABCD1+A2");
        assert_eq!(shift_row_refs("=A1*10", 3), "=A4*10");
    }

    #[test]
    fn letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }
}
