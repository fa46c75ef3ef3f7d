use axum::{
    Json,
    extract::rejection::QueryRejection,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Failures while loading a source table. All of these are fatal at startup.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("source file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{source_name} is missing required columns: {}", .missing.join(", "))]
    Schema {
        source_name: String,
        missing: Vec<String>,
    },

    #[error("{source_name} line {line}: {reason}")]
    Malformed {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error("{source_name} has no header row")]
    Empty { source_name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
}

/// Internal failure of a single query. Never shown to clients.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("chapter is required")]
    MissingChapter,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Errors returned by HTTP handlers. Messages are generic by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound(&'static str),
    Internal(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

// The rejection text names serde and parser internals; it goes to the log,
// the client gets the generic message.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {}", rejection.body_text());
        ApiError::BadRequest("Invalid query parameters")
    }
}
