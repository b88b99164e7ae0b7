//! Tabular decoder for spreadsheet CSV exports
//!
//! Parses raw delimited text into row maps keyed by the header line's column
//! names. The scan is quote-aware for commas only: lines are split before the
//! quote-aware pass, so a quoted field containing an embedded newline is not
//! reassembled. That is a known limitation of the source format handling,
//! kept deliberately; the upstream sheets never produce such fields.
//!
//! Decoding never fails. Ragged rows (fewer fields than headers) simply leave
//! the remaining keys absent from that row's map.

use std::collections::HashMap;

/// One decoded row: column name → field value, plus [`ROW_INDEX_KEY`].
pub type Row = HashMap<String, String>;

/// Synthetic column carrying the 1-based source line of the row
/// (line 1 is the header, so the first data row is "2").
pub const ROW_INDEX_KEY: &str = "_rowIndex";

/// Decode CSV text into rows.
///
/// Input with fewer than 2 non-blank lines yields an empty vector.
pub fn decode(text: &str) -> Vec<Row> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Vec::new();
    }

    let headers: Vec<String> = lines[0].split(',').map(strip_field).collect();

    lines[1..]
        .iter()
        .enumerate()
        .map(|(idx, line)| decode_line(line, &headers, idx))
        .collect()
}

fn decode_line(line: &str, headers: &[String], data_offset: usize) -> Row {
    let mut row = Row::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut col = 0usize;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                if col < headers.len() {
                    row.insert(headers[col].clone(), strip_field(&current));
                }
                col += 1;
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if col < headers.len() {
        row.insert(headers[col].clone(), strip_field(&current));
    }

    row.insert(ROW_INDEX_KEY.to_string(), (data_offset + 2).to_string());
    row
}

/// Trim surrounding whitespace and at most one leading and one trailing quote.
fn strip_field(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    trimmed.to_string()
}
