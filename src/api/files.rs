//! Method-dispatched handlers for the filesystem surface.
//!
//! All paths under `/fs` funnel through one dispatcher keyed on the request
//! method: GET/HEAD read, PUT writes, DELETE removes, and the WebDAV verbs
//! MKCOL and MOVE cover directory creation and renames.

use crate::api::middleware::AuthUser;
use crate::domain::entry::{DirEntry, flags};
use crate::error::FsError;
use crate::utils::state::AppState;
use crate::vfs::fs::UserFs;
use axum::Json;
use axum::body::Body;
use axum::extract::{Extension, Path, Request, State};
use axum::http::header::{CONTENT_LENGTH, LAST_MODIFIED};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::io;
use std::sync::Arc;
use tokio_util::io::StreamReader;

const READ_CHUNK: usize = 256 * 1024;

pub async fn dispatch_root(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(username)): Extension<AuthUser>,
    request: Request,
) -> Result<Response, FsError> {
    dispatch(state, username, "/".to_string(), request).await
}

pub async fn dispatch_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(username)): Extension<AuthUser>,
    Path(tail): Path<String>,
    request: Request,
) -> Result<Response, FsError> {
    dispatch(state, username, format!("/{tail}"), request).await
}

async fn dispatch(
    state: Arc<AppState>,
    username: String,
    path: String,
    request: Request,
) -> Result<Response, FsError> {
    let fs = UserFs::new(state.ctx.clone(), &username)?;
    tracing::debug!(
        "fs request: username: {}, method: {}, path: {}",
        fs.username(),
        request.method(),
        path
    );

    match *request.method() {
        Method::GET => get_handler(&fs, &path).await,
        Method::HEAD => head_handler(&fs, &path).await,
        Method::PUT => put_handler(&fs, &path, request).await,
        Method::DELETE => {
            fs.remove_all(&path).await?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        ref method => match method.as_str() {
            "MKCOL" => {
                fs.mkdir(&path, 0o755).await?;
                Ok(StatusCode::CREATED.into_response())
            }
            "MOVE" => move_handler(&fs, &path, request.headers()).await,
            _ => Ok((StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response()),
        },
    }
}

/// Files come back as their bytes, streamed chunk by chunk off the handle;
/// directories come back as a JSON array of their immediate children.
async fn get_handler(fs: &UserFs, path: &str) -> Result<Response, FsError> {
    let mut handle = fs.open(path, flags::RDONLY, 0).await?;

    if handle.entry().is_dir() {
        let children: Vec<DirEntry> = handle.readdir(0).await?;
        return Ok(Json(children).into_response());
    }

    let size = handle.entry().size;
    let modified = handle.entry().modified;
    let stream = futures::stream::try_unfold(handle, |mut handle| async move {
        let mut chunk = vec![0u8; READ_CHUNK];
        let n = handle.read(&mut chunk).await?;
        if n == 0 {
            return Ok::<_, FsError>(None);
        }
        chunk.truncate(n);
        Ok(Some((chunk, handle)))
    });

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_LENGTH, size)
        .header(LAST_MODIFIED, http_date(modified))
        .body(Body::from_stream(stream))
        .unwrap())
}

async fn head_handler(fs: &UserFs, path: &str) -> Result<Response, FsError> {
    let entry = fs.stat(path).await?;
    Ok((
        StatusCode::OK,
        [
            (CONTENT_LENGTH, entry.size.to_string()),
            (LAST_MODIFIED, http_date(entry.modified)),
        ],
    )
        .into_response())
}

/// Whole-file upload: the target is created or truncated, then the body is
/// streamed in. The transfer is bounded by Content-Length; a short or
/// interrupted body that still committed bytes surfaces as a partial write.
async fn put_handler(fs: &UserFs, path: &str, request: Request) -> Result<Response, FsError> {
    let total_size = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| FsError::Invalid("missing or invalid Content-Length".to_string()))?;

    let mut handle = fs
        .open(path, flags::CREATE | flags::WRONLY | flags::TRUNC, 0o644)
        .await?;

    let stream = request.into_body().into_data_stream().map_err(io::Error::other);
    let mut reader = StreamReader::new(stream);

    let committed = handle.write_from(&mut reader, total_size).await?;
    if committed != total_size {
        return Err(FsError::PartialWrite {
            requested: total_size,
            committed,
        });
    }
    Ok(StatusCode::CREATED.into_response())
}

async fn move_handler(fs: &UserFs, path: &str, headers: &HeaderMap) -> Result<Response, FsError> {
    let destination = headers
        .get("Destination")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| FsError::Invalid("missing Destination header".to_string()))?;

    fs.rename(path, strip_destination(destination)).await?;
    Ok(StatusCode::CREATED.into_response())
}

/// The Destination header may be a full URL or a server-relative path; either
/// way the filesystem path is what follows the `/fs` mount. The bare mount
/// means root.
fn strip_destination(destination: &str) -> &str {
    match destination.find("/fs/") {
        Some(idx) => &destination[idx + "/fs".len()..],
        None if destination.ends_with("/fs") => "/",
        None => destination,
    }
}

fn http_date(when: DateTime<Utc>) -> String {
    when.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
