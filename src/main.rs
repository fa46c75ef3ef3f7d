mod config;
mod error;
mod models;
mod routes;
mod services;
mod utils;

use anyhow::Context;
use config::Config;
use routes::AppState;
use services::{
    hymns::HymnStore, presentations::PresentationStore, scripture::ScriptureStore,
    songs::SongsDb,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Bible path: {}", config.bible_path.display());
    tracing::info!("Hymns path: {}", config.hymns_path.display());

    config
        .ensure_data_dir()
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;

    // Both sources must load before the service starts.
    let scripture = ScriptureStore::load(&config.bible_path)
        .with_context(|| format!("failed to load scripture from {}", config.bible_path.display()))?;
    if scripture.is_empty() {
        tracing::warn!("Scripture source has no verses");
    }
    let hymns = HymnStore::load(&config.hymns_path)
        .with_context(|| format!("failed to load hymns from {}", config.hymns_path.display()))?;
    tracing::info!("Serving {} verses and {} hymns", scripture.len(), hymns.len());

    let songs = config.songs_db.as_deref().map(|path| Arc::new(SongsDb::new(path)));

    let app_state = AppState {
        scripture: Arc::new(scripture),
        hymns: Arc::new(hymns),
        songs,
        presentations: Arc::new(PresentationStore::new()),
    };

    let app = routes::router(app_state, &config.static_dir);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
