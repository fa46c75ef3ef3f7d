use std::path::{Path, PathBuf};
use tracing::info;

/// Runtime settings, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub bible_path: PathBuf,
    pub hymns_path: PathBuf,
    /// SQLite file with a `songs` table. When unset, `/api/songs` is served
    /// from the hymn sheet.
    pub songs_db: Option<PathBuf>,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let data_dir = PathBuf::from(var("DATA_DIR", "data"));
        let bible_path = data_dir.join(var("BIBLE_FILE", "asv.csv"));
        let hymns_path = data_dir.join(var("HYMNS_FILE", "SongsSlide.xlsx"));
        let songs_db = lookup("SONGS_DB")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Config {
            bind_addr: var("BIND_ADDR", "0.0.0.0:3000"),
            bible_path,
            hymns_path,
            songs_db,
            static_dir: PathBuf::from(var("STATIC_DIR", "static")),
            data_dir,
        }
    }

    /// Creates the data directory when it does not exist yet. The source
    /// files themselves still have to be put there.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        ensure_dir(&self.data_dir)
    }
}

fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        info!("Created data directory at: {}", dir.display());
    }
    Ok(())
}
