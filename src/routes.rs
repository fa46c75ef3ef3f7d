use crate::error::ApiError;
use crate::models::{
    BookInfo, BookName, ChapterInfo, NewPresentation, Presentation, Song, StructuredHymn,
    Validation, Verse,
};
use crate::services::{
    hymns::HymnStore,
    presentations::{NAME_REQUIRED, PresentationStore},
    scripture::ScriptureStore,
    songs::SongsDb,
};
use crate::utils::{coerce_positive, parse_optional};
use axum::{
    Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
    routing::{delete, get},
};
use serde::Deserialize;
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub scripture: Arc<ScriptureStore>,
    pub hymns: Arc<HymnStore>,
    pub songs: Option<Arc<SongsDb>>,
    pub presentations: Arc<PresentationStore>,
}

pub fn router(state: AppState, static_dir: &FsPath) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("main_template.html")))
        .route("/health", get(health_check))
        .route("/api/bible/search", get(search_bible))
        .route("/api/bible/books", get(search_books))
        .route("/api/bible/books/:book", get(book_info))
        .route("/api/bible/books/:book/:chapter", get(chapter_info))
        .route("/api/bible/validate", get(validate_reference))
        .route("/api/hymns", get(search_hymns))
        .route("/api/hymns/:number", get(get_hymn))
        .route("/api/songs", get(search_songs))
        .route("/api/songs/:id", get(get_song))
        .route(
            "/api/presentations",
            get(list_presentations).post(create_presentation),
        )
        .route("/api/presentations/:id", delete(delete_presentation))
        .with_state(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Default, Deserialize)]
struct ReferenceParams {
    book: Option<String>,
    chapter: Option<String>,
    verse_start: Option<String>,
    verse_end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    search: String,
}

async fn search_bible(
    State(state): State<AppState>,
    query: Result<Query<ReferenceParams>, QueryRejection>,
) -> Result<Json<Vec<Verse>>, ApiError> {
    let Query(params) = query?;
    let parsed = (
        parse_optional(params.chapter.as_deref()),
        parse_optional(params.verse_start.as_deref()),
        parse_optional(params.verse_end.as_deref()),
    );
    let (chapter, verse_start, verse_end) = match parsed {
        (Ok(chapter), Ok(start), Ok(end)) => (chapter, start, end),
        _ => return Err(ApiError::BadRequest("Invalid chapter or verse numbers")),
    };

    let book = params.book.unwrap_or_default();
    if book.is_empty() || chapter.is_none() {
        return Err(ApiError::BadRequest("Book and chapter are required"));
    }

    Ok(Json(
        state
            .scripture
            .fetch_verses(&book, chapter, verse_start, verse_end),
    ))
}

async fn search_books(
    State(state): State<AppState>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<BookName>>, ApiError> {
    let Query(params) = query?;
    Ok(Json(state.scripture.search_books(&params.search)))
}

async fn book_info(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<BookInfo>, ApiError> {
    let not_found = ApiError::NotFound("Book not found");
    let book = path_param(path, not_found.clone())?;
    state.scripture.book_info(&book).map(Json).ok_or(not_found)
}

async fn chapter_info(
    State(state): State<AppState>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> Result<Json<ChapterInfo>, ApiError> {
    let not_found = ApiError::NotFound("Chapter not found");
    let (book, chapter) = path_param(path, not_found.clone())?;
    state
        .scripture
        .chapter_info(&book, chapter)
        .map(Json)
        .ok_or(not_found)
}

async fn validate_reference(
    State(state): State<AppState>,
    query: Result<Query<ReferenceParams>, QueryRejection>,
) -> Result<Json<Validation>, ApiError> {
    let Query(params) = query?;
    Ok(Json(state.scripture.validate_reference(
        params.book.as_deref().unwrap_or_default(),
        coerce_positive(params.chapter.as_deref()),
        coerce_positive(params.verse_start.as_deref()),
        coerce_positive(params.verse_end.as_deref()),
    )))
}

async fn search_hymns(
    State(state): State<AppState>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<StructuredHymn>>, ApiError> {
    let Query(params) = query?;
    Ok(Json(state.hymns.search_hymns(&params.search)))
}

async fn get_hymn(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<StructuredHymn>, ApiError> {
    let not_found = ApiError::NotFound("Hymn not found");
    let number = path_param(path, not_found.clone())?;
    state.hymns.get_hymn(number).map(Json).ok_or(not_found)
}

/// Rows of the songs database when one is configured, otherwise the hymn
/// sheet in the same shape.
async fn search_songs(
    State(state): State<AppState>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Song>>, ApiError> {
    let Query(params) = query?;
    let Some(db) = state.songs else {
        let hymns = state.hymns.search_hymns(&params.search);
        return Ok(Json(hymns.iter().map(Song::from).collect()));
    };

    match tokio::task::spawn_blocking(move || db.search(&params.search)).await {
        Ok(songs) => Ok(Json(songs)),
        Err(err) => {
            error!("Song search task failed: {}", err);
            Ok(Json(Vec::new()))
        }
    }
}

async fn get_song(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Song>, ApiError> {
    let not_found = ApiError::NotFound("Song not found");
    let id = path_param(path, not_found.clone())?;
    let Some(db) = state.songs else {
        return state
            .hymns
            .get_hymn(id)
            .map(|hymn| Json(Song::from(&hymn)))
            .ok_or(not_found);
    };

    match tokio::task::spawn_blocking(move || db.get(id)).await {
        Ok(Some(song)) => Ok(Json(song)),
        Ok(None) => Err(not_found),
        Err(err) => {
            error!("Song lookup task failed: {}", err);
            Err(ApiError::Internal("Failed to fetch song"))
        }
    }
}

async fn list_presentations(State(state): State<AppState>) -> Json<Vec<Presentation>> {
    Json(state.presentations.list())
}

async fn create_presentation(
    State(state): State<AppState>,
    body: Result<Json<NewPresentation>, JsonRejection>,
) -> Result<(StatusCode, Json<Presentation>), ApiError> {
    // A body that is not JSON, or whose name is not a string, has no usable name.
    let Json(request) = body.map_err(|rejection| {
        debug!("Rejected presentation body: {}", rejection.body_text());
        ApiError::BadRequest(NAME_REQUIRED)
    })?;
    let presentation = state.presentations.create(request)?;
    Ok((StatusCode::CREATED, Json(presentation)))
}

/// Always 204: an unknown or unparseable id has nothing to delete.
async fn delete_presentation(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> StatusCode {
    if let Ok(Path(id)) = path {
        state.presentations.delete(id);
    }
    StatusCode::NO_CONTENT
}

/// Unwraps a path parameter, answering `err` when it does not parse. The
/// rejection detail is logged only.
fn path_param<T>(path: Result<Path<T>, PathRejection>, err: ApiError) -> Result<T, ApiError> {
    path.map(|Path(value)| value).map_err(|rejection| {
        debug!("Rejected path parameter: {}", rejection.body_text());
        err
    })
}
