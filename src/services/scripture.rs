use crate::error::{LoadError, QueryError};
use crate::models::{BookInfo, BookName, ChapterInfo, Validation, Verse, VerseRow};
use crate::services::table::{Row, Table, read_delimited};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Descriptive lines at the top of the scripture export, before the header row.
pub const SCRIPTURE_PREAMBLE_LINES: usize = 5;

const BOOK_COLUMN: &str = "Book Name";
const CHAPTER_COLUMN: &str = "Chapter";
const VERSE_COLUMN: &str = "Verse";
const TEXT_COLUMN: &str = "Text";
const VERSE_ID_COLUMN: &str = "Verse ID";

const REQUIRED_COLUMNS: &[&str] = &[BOOK_COLUMN, CHAPTER_COLUMN, VERSE_COLUMN, TEXT_COLUMN];

pub const BOOK_NOT_FOUND: &str = "Book not found";
pub const CHAPTER_NOT_FOUND: &str = "Chapter not found";
pub const START_NOT_FOUND: &str = "Starting verse not found";
pub const END_NOT_FOUND: &str = "Ending verse not found";
pub const START_AFTER_END: &str = "Starting verse cannot be greater than ending verse";
pub const VALID_REFERENCE: &str = "Valid reference";
pub const VALIDATION_FAILED: &str = "Error validating reference";

/// In-memory scripture table. Loaded once, read-only afterwards.
#[derive(Debug, Default)]
pub struct ScriptureStore {
    verses: Vec<VerseRow>,
}

impl ScriptureStore {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let table = read_delimited(path, SCRIPTURE_PREAMBLE_LINES)?.normalize();
        info!(
            "Loaded {} scripture rows from {} with columns {:?}",
            table.rows.len(),
            table.source_name,
            table.headers
        );
        Self::from_table(&table)
    }

    pub fn from_table(table: &Table) -> Result<Self, LoadError> {
        table.require(REQUIRED_COLUMNS)?;

        let book = required_column(table, BOOK_COLUMN)?;
        let chapter = required_column(table, CHAPTER_COLUMN)?;
        let verse = required_column(table, VERSE_COLUMN)?;
        let text = required_column(table, TEXT_COLUMN)?;
        let verse_id = table.column(VERSE_ID_COLUMN);

        let mut verses = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let book_name = row.get(book).to_string();
            if book_name.is_empty() {
                return Err(malformed(table, row, "book name is empty"));
            }

            let verse_id = match row.get_opt(verse_id) {
                Some(raw) => Some(
                    raw.parse::<i64>()
                        .map_err(|_| malformed(table, row, "verse id is not an integer"))?,
                ),
                None => None,
            };

            verses.push(VerseRow {
                verse_id,
                book_name,
                chapter: positive(table, row, chapter, CHAPTER_COLUMN)?,
                verse: positive(table, row, verse, VERSE_COLUMN)?,
                text: row.get(text).to_string(),
            });
        }

        Ok(ScriptureStore { verses })
    }

    #[cfg(test)]
    pub fn from_rows(verses: Vec<VerseRow>) -> Self {
        ScriptureStore { verses }
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }

    fn book_rows<'a>(&'a self, book: &str) -> impl Iterator<Item = &'a VerseRow> + 'a {
        let needle = book.to_lowercase();
        self.verses
            .iter()
            .filter(move |row| row.book_name.to_lowercase() == needle)
    }

    /// Verses of `book` `chapter`, narrowed by the optional verse bounds and
    /// ordered by verse number. Never fails: internal errors are logged and
    /// produce an empty list.
    pub fn fetch_verses(
        &self,
        book: &str,
        chapter: Option<i64>,
        verse_start: Option<i64>,
        verse_end: Option<i64>,
    ) -> Vec<Verse> {
        debug!(
            "Fetching verses for: {} {:?}:{:?}-{:?}",
            book, chapter, verse_start, verse_end
        );
        match self.try_fetch_verses(book, chapter, verse_start, verse_end) {
            Ok(verses) => {
                debug!("Found {} verses", verses.len());
                verses
            }
            Err(err) => {
                warn!("Error fetching verses for {}: {}", book, err);
                Vec::new()
            }
        }
    }

    pub fn try_fetch_verses(
        &self,
        book: &str,
        chapter: Option<i64>,
        verse_start: Option<i64>,
        verse_end: Option<i64>,
    ) -> Result<Vec<Verse>, QueryError> {
        let chapter = chapter.ok_or(QueryError::MissingChapter)?;

        let mut matches: Vec<&VerseRow> = self
            .book_rows(book)
            .filter(|row| i64::from(row.chapter) == chapter)
            .filter(|row| {
                let verse = i64::from(row.verse);
                match (verse_start, verse_end) {
                    (Some(start), Some(end)) => (start..=end).contains(&verse),
                    // An end bound without a start bound does not narrow the chapter.
                    (Some(start), None) => verse == start,
                    (None, _) => true,
                }
            })
            .collect();

        matches.sort_by_key(|row| (row.verse, row.verse_id));
        Ok(matches.into_iter().map(Verse::from).collect())
    }

    /// Checks a reference against the table, stopping at the first problem.
    pub fn validate_reference(
        &self,
        book: &str,
        chapter: Option<u32>,
        verse_start: Option<u32>,
        verse_end: Option<u32>,
    ) -> Validation {
        match self.try_validate_reference(book, chapter, verse_start, verse_end) {
            Ok(validation) => validation,
            Err(err) => {
                error!("Error validating reference {}: {}", book, err);
                Validation {
                    valid: false,
                    reason: VALIDATION_FAILED.to_string(),
                }
            }
        }
    }

    pub fn try_validate_reference(
        &self,
        book: &str,
        chapter: Option<u32>,
        verse_start: Option<u32>,
        verse_end: Option<u32>,
    ) -> Result<Validation, QueryError> {
        let invalid = |reason: &str| {
            Ok(Validation {
                valid: false,
                reason: reason.to_string(),
            })
        };

        let book_rows: Vec<&VerseRow> = self.book_rows(book).collect();
        if book_rows.is_empty() {
            return invalid(BOOK_NOT_FOUND);
        }

        let chapter = chapter.ok_or(QueryError::MissingChapter)?;
        let chapter_rows: Vec<&VerseRow> = book_rows
            .into_iter()
            .filter(|row| row.chapter == chapter)
            .collect();
        if chapter_rows.is_empty() {
            return invalid(CHAPTER_NOT_FOUND);
        }

        let has_verse = |n: u32| chapter_rows.iter().any(|row| row.verse == n);
        if let Some(start) = verse_start {
            if !has_verse(start) {
                return invalid(START_NOT_FOUND);
            }
        }
        if let Some(end) = verse_end {
            if !has_verse(end) {
                return invalid(END_NOT_FOUND);
            }
        }
        if let (Some(start), Some(end)) = (verse_start, verse_end) {
            if start > end {
                return invalid(START_AFTER_END);
            }
        }

        Ok(Validation {
            valid: true,
            reason: VALID_REFERENCE.to_string(),
        })
    }

    /// Distinct book names containing `term` (case-insensitive), sorted.
    pub fn search_books(&self, term: &str) -> Vec<BookName> {
        debug!("Searching for books with term: {}", term);
        let needle = term.to_lowercase();
        let books: BTreeSet<&str> = self
            .verses
            .iter()
            .map(|row| row.book_name.as_str())
            .filter(|name| needle.is_empty() || name.to_lowercase().contains(&needle))
            .collect();

        debug!("Found {} matching books", books.len());
        books
            .into_iter()
            .map(|book| BookName {
                book: book.to_string(),
            })
            .collect()
    }

    pub fn book_info(&self, book: &str) -> Option<BookInfo> {
        let rows: Vec<&VerseRow> = self.book_rows(book).collect();
        let first = rows.first()?;
        let chapters: BTreeSet<u32> = rows.iter().map(|row| row.chapter).collect();

        Some(BookInfo {
            name: first.book_name.clone(),
            chapters: chapters.into_iter().collect(),
            total_verses: rows.len(),
        })
    }

    pub fn chapter_info(&self, book: &str, chapter: u32) -> Option<ChapterInfo> {
        let rows: Vec<&VerseRow> = self
            .book_rows(book)
            .filter(|row| row.chapter == chapter)
            .collect();
        let first = rows.first()?;
        let verses: BTreeSet<u32> = rows.iter().map(|row| row.verse).collect();

        Some(ChapterInfo {
            book: first.book_name.clone(),
            chapter,
            verses: verses.into_iter().collect(),
            total_verses: rows.len(),
        })
    }
}

fn required_column(table: &Table, name: &str) -> Result<usize, LoadError> {
    table.column(name).ok_or_else(|| LoadError::Schema {
        source_name: table.source_name.clone(),
        missing: vec![name.to_string()],
    })
}

fn positive(table: &Table, row: &Row, column: usize, name: &str) -> Result<u32, LoadError> {
    row.get(column)
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| malformed(table, row, &format!("{name} is not a positive integer")))
}

fn malformed(table: &Table, row: &Row, reason: &str) -> LoadError {
    LoadError::Malformed {
        source_name: table.source_name.clone(),
        line: row.line,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn row(id: i64, book: &str, chapter: u32, verse: u32, text: &str) -> VerseRow {
        VerseRow {
            verse_id: Some(id),
            book_name: book.to_string(),
            chapter,
            verse,
            text: text.to_string(),
        }
    }

    fn sample_store() -> ScriptureStore {
        ScriptureStore::from_rows(vec![
            row(1, "Genesis", 1, 1, "In the beginning"),
            row(2, "Genesis", 1, 2, "And the earth was waste"),
            row(3, "Genesis", 2, 1, "And the heavens"),
            row(30, "John", 3, 17, "For God sent not the Son"),
            row(28, "John", 3, 15, "that whosoever believeth"),
            row(29, "John", 3, 16, "For God so loved the world"),
            row(31, "John", 4, 1, "When therefore the Lord knew"),
            row(40, "1 John", 1, 1, "That which was from the beginning"),
            row(41, "2 John", 1, 1, "The elder unto the elect lady"),
            row(42, "3 John", 1, 1, "The elder unto Gaius"),
        ])
    }

    fn verse_numbers(verses: &[Verse]) -> Vec<u32> {
        verses.iter().map(|v| v.verse).collect()
    }

    #[test]
    fn test_fetch_single_verse() {
        let store = sample_store();
        let verses = store.fetch_verses("John", Some(3), Some(16), Some(16));
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].verse, 16);
        assert_eq!(verses[0].text, "For God so loved the world");
    }

    #[test]
    fn test_fetch_whole_chapter_sorted() {
        let store = sample_store();
        let verses = store.fetch_verses("John", Some(3), None, None);
        assert_eq!(verse_numbers(&verses), vec![15, 16, 17]);
    }

    #[test]
    fn test_fetch_is_case_insensitive() {
        let store = sample_store();
        assert_eq!(
            store.fetch_verses("john", Some(3), None, None),
            store.fetch_verses("John", Some(3), None, None)
        );
        assert_eq!(store.fetch_verses("JOHN", Some(3), None, None).len(), 3);
    }

    #[test]
    fn test_fetch_range_inclusive() {
        let store = sample_store();
        let verses = store.fetch_verses("John", Some(3), Some(16), Some(17));
        assert_eq!(verse_numbers(&verses), vec![16, 17]);
    }

    #[test]
    fn test_fetch_start_only_is_exact() {
        let store = sample_store();
        let verses = store.fetch_verses("John", Some(3), Some(15), None);
        assert_eq!(verse_numbers(&verses), vec![15]);
    }

    #[test]
    fn test_fetch_end_only_is_ignored() {
        let store = sample_store();
        let verses = store.fetch_verses("John", Some(3), None, Some(15));
        assert_eq!(verse_numbers(&verses), vec![15, 16, 17]);
    }

    #[test]
    fn test_fetch_unknown_book_is_empty() {
        let store = sample_store();
        assert!(store.fetch_verses("Nonexistent", Some(1), None, None).is_empty());
    }

    #[test]
    fn test_fetch_negative_numbers_match_nothing() {
        let store = sample_store();
        assert!(store.fetch_verses("John", Some(-3), None, None).is_empty());
        assert!(store.fetch_verses("John", Some(3), Some(-1), None).is_empty());
        assert!(store.fetch_verses("John", Some(3), Some(15), Some(-1)).is_empty());

        let from_below = store.fetch_verses("John", Some(3), Some(-1), Some(16));
        assert_eq!(verse_numbers(&from_below), vec![15, 16]);
    }

    #[test]
    fn test_fetch_without_chapter_fails_soft() {
        let store = sample_store();
        assert!(store.fetch_verses("John", None, None, None).is_empty());
        assert!(matches!(
            store.try_fetch_verses("John", None, None, None),
            Err(QueryError::MissingChapter)
        ));
    }

    #[test]
    fn test_validate_reference() {
        let store = sample_store();
        let reason = |b, c, s, e| store.validate_reference(b, c, s, e).reason;

        assert_eq!(reason("Nonexistent", Some(1), None, None), BOOK_NOT_FOUND);
        assert_eq!(reason("John", Some(9), None, None), CHAPTER_NOT_FOUND);
        assert_eq!(reason("John", Some(3), Some(99), None), START_NOT_FOUND);
        assert_eq!(reason("John", Some(3), Some(15), Some(99)), END_NOT_FOUND);
        assert_eq!(reason("John", Some(3), Some(16), Some(15)), START_AFTER_END);
        assert_eq!(reason("john", Some(3), Some(15), Some(17)), VALID_REFERENCE);
        assert_eq!(reason("John", None, None, None), VALIDATION_FAILED);

        let ok = store.validate_reference("John", Some(3), None, None);
        assert!(ok.valid);
        let bad = store.validate_reference("John", Some(3), Some(16), Some(15));
        assert!(!bad.valid);
        assert_eq!(bad.reason, "Starting verse cannot be greater than ending verse");
    }

    #[test]
    fn test_search_books() {
        let store = sample_store();
        let names: Vec<String> = store.search_books("john").into_iter().map(|b| b.book).collect();
        assert_eq!(names, vec!["1 John", "2 John", "3 John", "John"]);

        let all: Vec<String> = store.search_books("").into_iter().map(|b| b.book).collect();
        assert_eq!(all, vec!["1 John", "2 John", "3 John", "Genesis", "John"]);

        assert!(store.search_books("Maccabees").is_empty());
    }

    #[test]
    fn test_book_and_chapter_info() {
        let store = sample_store();
        let info = store.book_info("john").unwrap();
        assert_eq!(info.name, "John");
        assert_eq!(info.chapters, vec![3, 4]);
        assert_eq!(info.total_verses, 4);
        assert!(store.book_info("Tobit").is_none());

        let chapter = store.chapter_info("John", 3).unwrap();
        assert_eq!(chapter.verses, vec![15, 16, 17]);
        assert_eq!(chapter.total_verses, 3);
        assert!(store.chapter_info("John", 21).is_none());
    }

    fn write_source(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asv.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    const PREAMBLE: &str = "ASV\nAmerican Standard Version (1901)\nPublic Domain\n\n#\n";

    #[test]
    fn test_load_from_file() {
        let (_dir, path) = write_source(&format!(
            "{PREAMBLE}Verse ID,Book Name,Book Number,Chapter,Verse,Text\n\
             43003016,John,43,3,16,\"For God so loved the world, that he gave\"\n\
             43003015,John,43,3,15,that whosoever believeth\n"
        ));

        let store = ScriptureStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        let verses = store.fetch_verses("John", Some(3), None, None);
        assert_eq!(verse_numbers(&verses), vec![15, 16]);
        assert_eq!(verses[1].text, "For God so loved the world, that he gave");
    }

    #[test]
    fn test_load_rejects_missing_columns() {
        let (_dir, path) =
            write_source(&format!("{PREAMBLE}Book Name;Chapter;Text\nJohn;3;For God\n"));

        match ScriptureStore::load(&path) {
            Err(LoadError::Schema { missing, .. }) => assert_eq!(missing, vec!["Verse"]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_non_numeric_chapter() {
        let (_dir, path) = write_source(&format!(
            "{PREAMBLE}Book Name;Chapter;Verse;Text\nJohn;three;16;For God\n"
        ));

        match ScriptureStore::load(&path) {
            Err(LoadError::Malformed { line, .. }) => assert_eq!(line, 7),
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScriptureStore::load(&dir.path().join("asv.csv")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }
}
