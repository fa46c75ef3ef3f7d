use crate::error::LoadError;
use crate::utils::strip_bom;
use calamine::{Data, Reader, open_workbook_auto};
use std::fs;
use std::path::Path;

/// Column names that drifted in the hymn spreadsheet, mapped to the names the
/// rest of the service queries by. Applied once, right after headers are
/// trimmed, and before any schema check.
pub const COLUMN_RENAMES: &[(&str, &str)] = &[
    ("Fouth", "Fourth"),
    ("Firth", "Fifth"),
    ("Nineth", "Ninth"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based line (or sheet row) in the source, for diagnostics.
    pub line: usize,
    pub cells: Vec<String>,
}

/// An untyped, row-oriented table. Typed views are built on top of it by the
/// scripture and hymn stores.
#[derive(Debug, Clone)]
pub struct Table {
    pub source_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(source_name: impl Into<String>, headers: Vec<String>, mut rows: Vec<Row>) -> Self {
        let width = headers.len();
        for row in &mut rows {
            if row.cells.len() < width {
                row.cells.resize(width, String::new());
            }
        }
        Table {
            source_name: source_name.into(),
            headers,
            rows,
        }
    }

    /// Trims header names and applies [`COLUMN_RENAMES`].
    pub fn normalize(mut self) -> Self {
        for header in &mut self.headers {
            let trimmed = header.trim();
            let canonical = COLUMN_RENAMES
                .iter()
                .find(|(old, _)| *old == trimmed)
                .map(|(_, new)| *new)
                .unwrap_or(trimmed);
            *header = canonical.to_string();
        }
        self
    }

    pub fn require(&self, required: &[&str]) -> Result<(), LoadError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| self.column(name).is_none())
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LoadError::Schema {
                source_name: self.source_name.clone(),
                missing,
            })
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }
}

impl Row {
    pub fn get(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    /// Cell at an optional column, `None` when the column is absent or the
    /// cell is blank.
    pub fn get_opt(&self, column: Option<usize>) -> Option<&str> {
        column.map(|c| self.get(c)).filter(|value| !value.is_empty())
    }
}

/// Reads a delimited text file. `skip_lines` leading lines are discarded
/// before the header row; the delimiter is sniffed from that header row.
pub fn read_delimited(path: &Path, skip_lines: usize) -> Result<Table, LoadError> {
    ensure_exists(path)?;
    let source_name = display_name(path);

    let content = fs::read_to_string(path)?;
    let body = skip_leading_lines(strip_bom(&content), skip_lines);

    let header_line = body
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| LoadError::Empty {
            source_name: source_name.clone(),
        })?;
    let delimiter = sniff_delimiter(header_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize + skip_lines)
            .unwrap_or_default();
        let cells: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }
        rows.push(Row { line, cells });
    }

    Ok(Table::new(source_name, headers, rows))
}

/// Reads the first worksheet of a spreadsheet (xlsx, xls, ods). The first row
/// is the header row.
pub fn read_spreadsheet(path: &Path) -> Result<Table, LoadError> {
    ensure_exists(path)?;
    let source_name = display_name(path);

    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::Empty {
            source_name: source_name.clone(),
        })??;

    let mut sheet_rows = range.rows();
    let headers = sheet_rows
        .next()
        .ok_or_else(|| LoadError::Empty {
            source_name: source_name.clone(),
        })?
        .iter()
        .map(cell_text)
        .collect();

    let rows = sheet_rows
        .enumerate()
        .map(|(idx, cells)| Row {
            line: idx + 2,
            cells: cells.iter().map(cell_text).collect(),
        })
        .filter(|row| row.cells.iter().any(|cell| !cell.is_empty()))
        .collect();

    Ok(Table::new(source_name, headers, rows))
}

/// Picks `;` when the header row has more semicolons than commas, `,`
/// otherwise.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semicolons > commas { b';' } else { b',' }
}

fn skip_leading_lines(text: &str, count: usize) -> &str {
    let mut rest = text;
    for _ in 0..count {
        match rest.find('\n') {
            Some(idx) => rest = &rest[idx + 1..],
            None => return "",
        }
    }
    rest
}

fn ensure_exists(path: &Path) -> Result<(), LoadError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(LoadError::NotFound(path.to_path_buf()))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// Whole-number floats are how spreadsheets store integers; render them
// without the fractional part so "12.0" compares as "12".
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        other => other.to_string().trim().to_string(),
    }
}
