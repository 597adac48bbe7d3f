use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Error, Debug)]
pub enum FsError {
    // Filesystem conditions surfaced to callers
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid operation: {0}")]
    Invalid(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("partial write: committed {committed} of {requested} bytes")]
    PartialWrite { requested: u64, committed: u64 },

    // Backend failures, wrapped with operation context where raised
    #[error("metadata backend error: {0}")]
    Metadata(#[from] sqlx::Error),

    #[error("content backend error: {0}")]
    Content(String),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Collapses the sqlx error zoo into the filesystem taxonomy: unique key
    /// collisions become `AlreadyExists`, missing rows become `NotFound`,
    /// anything else stays a metadata backend error.
    pub fn from_sqlx(err: sqlx::Error, context: &str) -> FsError {
        match &err {
            sqlx::Error::RowNotFound => FsError::NotFound(context.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                FsError::AlreadyExists(context.to_string())
            }
            _ => FsError::Metadata(err),
        }
    }
}

impl IntoResponse for FsError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {self}");

        let status = match &self {
            FsError::NotFound(_) => StatusCode::NOT_FOUND,
            FsError::AlreadyExists(_) | FsError::NotEmpty(_) => StatusCode::CONFLICT,
            FsError::Invalid(_) => StatusCode::BAD_REQUEST,
            FsError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            FsError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            FsError::PartialWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            FsError::Metadata(_) | FsError::Content(_) => StatusCode::SERVICE_UNAVAILABLE,
            FsError::Migration(_) | FsError::Bcrypt(_) | FsError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "error": self.to_string() }));

        if let FsError::Unauthorized(_) = self {
            let mut headers = HeaderMap::new();
            headers.insert("Www-Authenticate", r#"Basic realm="webfs""#.parse().unwrap());
            return (status, headers, body).into_response();
        }

        (status, body).into_response()
    }
}
