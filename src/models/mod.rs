use serde::{Deserialize, Serialize};

/// One row of the scripture table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseRow {
    pub verse_id: Option<i64>,
    pub book_name: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

impl From<&VerseRow> for Verse {
    fn from(row: &VerseRow) -> Self {
        Verse {
            book: row.book_name.clone(),
            chapter: row.chapter,
            verse: row.verse,
            text: row.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookName {
    pub book: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookInfo {
    pub name: String,
    pub chapters: Vec<u32>,
    pub total_verses: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterInfo {
    pub book: String,
    pub chapter: u32,
    pub verses: Vec<u32>,
    pub total_verses: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub reason: String,
}

/// A hymn exactly as it sits in the spreadsheet, one slot per verse column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HymnRow {
    pub number: String,
    pub title: String,
    pub slots: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HymnVerse {
    #[serde(rename = "number")]
    pub position: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredHymn {
    pub number: i64,
    pub title: String,
    pub verses: Vec<HymnVerse>,
    pub chorus: Option<String>,
    pub total_verses: usize,
}

/// Row of the relational `songs` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub song_id: i64,
    pub title: String,
    pub song_number: Option<i64>,
    pub lyrics: Option<String>,
}

/// Song view of a hymn, for deployments without a songs database. The lyrics
/// are the verses in order with the chorus repeated after each one, separated
/// by blank lines.
impl From<&StructuredHymn> for Song {
    fn from(hymn: &StructuredHymn) -> Self {
        let mut sections: Vec<&str> = Vec::new();
        for verse in &hymn.verses {
            sections.push(&verse.text);
            if let Some(chorus) = &hymn.chorus {
                sections.push(chorus);
            }
        }
        if sections.is_empty() {
            sections.extend(hymn.chorus.as_deref());
        }

        Song {
            song_id: hymn.number,
            title: hymn.title.clone(),
            song_number: Some(hymn.number),
            lyrics: Some(sections.join("\n\n")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    pub id: u64,
    pub name: String,
    pub date: String,
    pub slides: Vec<serde_json::Value>,
    pub created_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewPresentation {
    pub name: Option<String>,
    pub date: Option<String>,
    pub slides: Option<Vec<serde_json::Value>>,
}
