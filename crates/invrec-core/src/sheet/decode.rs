//! Decoding of tabular files into a plain grid of cell strings.

use std::fmt;
use std::io::{Cursor, Read, Seek};

use calamine::{Data, Ods, Reader, Xls, Xlsx};
use tracing::debug;

use crate::error::ImportError;

use super::{Result, SheetKind};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A decoded sheet. Row `i` is physical row `i + 1`; cells are trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// True if the row is missing or every cell is empty.
    pub fn is_blank_row(&self, idx: usize) -> bool {
        self.rows
            .get(idx)
            .is_none_or(|row| row.iter().all(|cell| cell.is_empty()))
    }

    /// Number of rows with at least one non-empty cell.
    pub fn non_blank_rows(&self) -> usize {
        (0..self.rows.len()).filter(|&i| !self.is_blank_row(i)).count()
    }
}

/// Decode the first sheet of a tabular file.
pub fn decode(bytes: &[u8], kind: SheetKind, delimiter: Option<u8>) -> Result<Sheet> {
    let sheet = match kind {
        SheetKind::Csv => decode_csv(bytes, delimiter)?,
        SheetKind::Xlsx => first_sheet::<_, Xlsx<_>>(Cursor::new(bytes))?,
        SheetKind::Xls => first_sheet::<_, Xls<_>>(Cursor::new(bytes))?,
        SheetKind::Ods => first_sheet::<_, Ods<_>>(Cursor::new(bytes))?,
    };

    debug!(
        "Decoded {:?} sheet: {} rows, {} columns",
        kind,
        sheet.rows.len(),
        sheet.width()
    );
    Ok(sheet)
}

fn decode_csv(bytes: &[u8], delimiter: Option<u8>) -> Result<Sheet> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(bytes));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| ImportError::MalformedSheet {
            reason: e.to_string(),
        })?;

        // The reader skips empty lines; keep rows aligned with source lines
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 1);
        while rows.len() + 1 < line {
            rows.push(Vec::new());
        }

        rows.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).trim().to_string())
                .collect(),
        );
    }

    Ok(Sheet { rows })
}

/// Pick the most frequent of `;`, tab and `,` on the first non-empty line.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes
        .split(|&b| b == b'\n')
        .find(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
        .unwrap_or(&[]);

    [b'\t', b';', b',']
        .into_iter()
        .map(|d| (d, first_line.iter().filter(|&&b| b == d).count()))
        .filter(|&(_, count)| count > 0)
        .max_by_key(|&(_, count)| count)
        .map_or(b',', |(d, _)| d)
}

fn first_sheet<RS, R>(reader: RS) -> Result<Sheet>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: fmt::Display,
{
    let mut workbook = R::new(reader).map_err(malformed)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::MalformedSheet {
            reason: "workbook has no sheets".to_string(),
        })?
        .map_err(malformed)?;

    // Ranges start at the first used cell; pad back to A1
    let (row_offset, col_offset) = range
        .start()
        .map_or((0, 0), |(r, c)| (r as usize, c as usize));

    let mut rows = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![String::new(); col_offset];
        cells.extend(row.iter().map(cell_to_string));
        rows.push(cells);
    }

    Ok(Sheet { rows })
}

fn malformed(e: impl fmt::Display) -> ImportError {
    ImportError::MalformedSheet {
        reason: e.to_string(),
    }
}

/// Render a workbook cell as text.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
    }
}
