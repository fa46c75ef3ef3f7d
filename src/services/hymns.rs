use crate::error::LoadError;
use crate::models::{HymnRow, HymnVerse, StructuredHymn};
use crate::services::table::{Table, read_delimited, read_spreadsheet};
use std::num::ParseIntError;
use std::path::Path;
use tracing::{debug, error, info, warn};

const NUMBER_COLUMN: &str = "Hymn number";
const TITLE_COLUMN: &str = "Hymn";

/// Verse slot columns, in sheet order (after spelling correction).
pub const VERSE_COLUMNS: [&str; 10] = [
    "First", "Second", "Third", "Fourth", "Fifth", "Sixth", "Seventh", "Eighth", "Ninth", "Tenth",
];

#[derive(Debug, Default)]
pub struct HymnStore {
    rows: Vec<HymnRow>,
}

impl HymnStore {
    /// Loads the hymn sheet. Spreadsheets go through calamine; a `.csv`
    /// export with the same header row is accepted as well.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let table = if is_csv {
            read_delimited(path, 0)?
        } else {
            read_spreadsheet(path)?
        };
        let table = table.normalize();

        info!(
            "Loaded {} hymns from {} with columns {:?}",
            table.rows.len(),
            table.source_name,
            table.headers
        );
        Self::from_table(&table)
    }

    pub fn from_table(table: &Table) -> Result<Self, LoadError> {
        table.require(&[NUMBER_COLUMN, TITLE_COLUMN])?;
        let number = table.column(NUMBER_COLUMN);
        let title = table.column(TITLE_COLUMN);
        let slot_columns = VERSE_COLUMNS.map(|name| table.column(name));

        let rows = table
            .rows
            .iter()
            .map(|row| HymnRow {
                number: row.get_opt(number).unwrap_or_default().to_string(),
                title: row.get_opt(title).unwrap_or_default().to_string(),
                slots: slot_columns
                    .iter()
                    .map(|column| row.get_opt(*column).map(str::to_string))
                    .collect(),
            })
            .collect();

        Ok(HymnStore { rows })
    }

    #[cfg(test)]
    pub fn from_rows(rows: Vec<HymnRow>) -> Self {
        HymnStore { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Hymns whose title contains `term` (case-insensitive) or whose number
    /// contains it, ordered by number. Rows that fail to structure are
    /// skipped.
    pub fn search_hymns(&self, term: &str) -> Vec<StructuredHymn> {
        debug!("Searching hymns with term: {}", term);
        let needle = term.to_lowercase();

        let mut results: Vec<StructuredHymn> = self
            .rows
            .iter()
            .filter(|row| {
                needle.is_empty()
                    || row.title.to_lowercase().contains(&needle)
                    || row.number.contains(term)
            })
            .filter_map(structure)
            .collect();

        results.sort_by_key(|hymn| hymn.number);
        debug!("Found {} hymns", results.len());
        results
    }

    pub fn get_hymn(&self, number: i64) -> Option<StructuredHymn> {
        self.rows
            .iter()
            .find(|row| row.number.trim().parse::<i64>() == Ok(number))
            .and_then(structure)
    }
}

/// Reshapes a raw hymn row into ordered verses plus an optional chorus.
/// Returns `None` for a row whose hymn number is not an integer.
pub fn structure(row: &HymnRow) -> Option<StructuredHymn> {
    match try_structure(row) {
        Ok(hymn) => Some(hymn),
        Err(err) => {
            error!("Error processing hymn {:?} ({}): {}", row.number, row.title, err);
            None
        }
    }
}

fn try_structure(row: &HymnRow) -> Result<StructuredHymn, ParseIntError> {
    let number = row.number.trim().parse::<i64>()?;

    let texts: Vec<&str> = row
        .slots
        .iter()
        .flatten()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect();

    // Only the first text that recurs later becomes the chorus.
    let chorus = texts
        .iter()
        .enumerate()
        .find(|&(idx, text)| texts[idx + 1..].contains(text))
        .map(|(_, text)| text.to_string());

    if let Some(chorus) = &chorus {
        debug!("Hymn {} has chorus of {} chars", number, chorus.len());
    }

    let verses: Vec<HymnVerse> = texts
        .iter()
        .filter(|text| chorus.as_deref() != Some(**text))
        .enumerate()
        .map(|(idx, text)| HymnVerse {
            position: idx as u32 + 1,
            text: text.to_string(),
        })
        .collect();

    if verses.is_empty() && chorus.is_none() {
        warn!("Hymn {} has no verse text", number);
    }

    Ok(StructuredHymn {
        number,
        title: row.title.trim().to_string(),
        total_verses: verses.len(),
        verses,
        chorus,
    })
}
