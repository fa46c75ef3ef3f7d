use crate::error::QueryError;
use crate::models::Song;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

const SONG_COLUMNS: &str = "song_id, title, song_number, lyrics";

/// Read access to an external `songs(song_id, title, song_number, lyrics)`
/// table. The connection is validated before every query and reopened once
/// if it has gone away; there is no further retry.
pub struct SongsDb {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SongsDb {
    /// Tries to connect straight away so misconfiguration shows up in the
    /// startup log, but a failure here is not fatal.
    pub fn new(path: &Path) -> Self {
        let conn = match open(path) {
            Ok(conn) => {
                info!("Connected to songs database at {}", path.display());
                Some(conn)
            }
            Err(err) => {
                warn!("Songs database at {} unavailable: {}", path.display(), err);
                None
            }
        };

        SongsDb {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        }
    }

    fn with_connection<T>(
        &self,
        query: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, QueryError> {
        let mut guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let conn = match guard.take() {
            Some(conn) if is_alive(&conn) => conn,
            Some(_) => {
                warn!("Songs database connection lost, reconnecting");
                open(&self.path)?
            }
            None => open(&self.path)?,
        };

        let result = query(&conn);
        *guard = Some(conn);
        Ok(result?)
    }

    /// Songs whose title contains `term` (case-insensitive) or whose number
    /// contains it, ordered by song number. Failures are logged and yield an
    /// empty list.
    pub fn search(&self, term: &str) -> Vec<Song> {
        match self.try_search(term) {
            Ok(songs) => {
                debug!("Found {} songs for {:?}", songs.len(), term);
                songs
            }
            Err(err) => {
                error!("Error searching songs: {}", err);
                Vec::new()
            }
        }
    }

    pub fn try_search(&self, term: &str) -> Result<Vec<Song>, QueryError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SONG_COLUMNS} FROM songs
                 WHERE ?1 = ''
                    OR instr(LOWER(title), LOWER(?1)) > 0
                    OR instr(CAST(song_number AS TEXT), ?1) > 0
                 ORDER BY song_number, song_id"
            ))?;

            let songs = stmt
                .query_map(params![term], song_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(songs)
        })
    }

    pub fn get(&self, song_id: i64) -> Option<Song> {
        self.try_get(song_id).unwrap_or_else(|err| {
            error!("Error fetching song {}: {}", song_id, err);
            None
        })
    }

    pub fn try_get(&self, song_id: i64) -> Result<Option<Song>, QueryError> {
        self.with_connection(|conn| {
            conn.query_row(
                &format!("SELECT {SONG_COLUMNS} FROM songs WHERE song_id = ?1"),
                params![song_id],
                song_from_row,
            )
            .optional()
        })
    }
}

fn open(path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

fn is_alive(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .is_ok()
}

fn song_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        song_id: row.get(0)?,
        title: row.get(1)?,
        song_number: row.get(2)?,
        lyrics: row.get(3)?,
    })
}
