//! Axum router and request handlers.
//!
//! Handlers stay thin: they validate the JSON body, hand the blocking work
//! (extractor runs, scratch sweeps) to `spawn_blocking`, and translate errors
//! into the `{ "error": ... }` envelope.

use std::{
    io,
    path::{Path, PathBuf},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::Stream;
use mime_guess::MimeGuess;
use serde::Deserialize;
use tokio::{fs::File, task};
use tokio_util::io::ReaderStream;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    config::{SERVICE_NAME, ScratchDir},
    error::{ApiError, ApiResult},
    extractor::Extractor,
    formats, janitor,
    metadata::VideoMetadata,
    orchestrator::{self, FetchedVideo},
};

const MAX_TITLE_CHARS: usize = 100;
const FALLBACK_FILENAME: &str = "video";
const FALLBACK_EXT: &str = "mp4";

#[derive(Clone)]
pub struct AppState {
    extractor: Arc<dyn Extractor>,
    scratch: Arc<ScratchDir>,
}

impl AppState {
    pub fn new(extractor: Arc<dyn Extractor>, scratch: ScratchDir) -> Self {
        Self {
            extractor,
            scratch: Arc::new(scratch),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct VideoInfoRequest {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    format_id: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/video-info", post(video_info))
        .route("/api/download", post(download))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Any origin may call the API. `Content-Disposition` is exposed so browser
/// clients can read the suggested filename.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION])
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
    }))
}

async fn video_info(
    State(state): State<AppState>,
    payload: Result<Json<VideoInfoRequest>, JsonRejection>,
) -> ApiResult<Json<VideoMetadata>> {
    let Json(request) = payload.map_err(invalid_body)?;
    let url = required(request.url, "url")?;
    info!(%url, "video info requested");

    let extractor = state.extractor.clone();
    let scratch = state.scratch.clone();
    let probe_url = url.clone();
    let result = task::spawn_blocking(move || {
        janitor::sweep(scratch.path());
        extractor.probe(&probe_url)
    })
    .await
    .map_err(|err| ApiError::internal(format!("task join error: {err}")))?;

    let info = result.map_err(|err| {
        error!(%url, "metadata lookup failed: {err}");
        ApiError::from(err)
    })?;

    Ok(Json(formats::normalize_video(info)))
}

async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(invalid_body)?;
    let url = required(request.url, "url")?;
    let format_id = required(request.format_id, "format_id")?;
    info!(%url, %format_id, "download requested");

    let extractor = state.extractor.clone();
    let scratch = state.scratch.clone();
    let (fetch_url, fetch_format) = (url.clone(), format_id.clone());
    // The guard is built on the blocking thread so the file is removed even
    // when the client goes away before the fetch finishes.
    let result = task::spawn_blocking(move || {
        orchestrator::fetch_best_effort(extractor.as_ref(), &scratch, &fetch_url, &fetch_format)
            .map(GuardedDownload::from)
    })
    .await
    .map_err(|err| ApiError::internal(format!("task join error: {err}")))?;

    let download = result.map_err(|err| {
        error!(%url, %format_id, "download failed: {err}");
        ApiError::from(err)
    })?;

    stream_download(download).await
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(format!("invalid request body: {}", rejection.body_text()))
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

/// A finished download whose file is deleted when this value is dropped.
struct GuardedDownload {
    file: ScratchFile,
    title: String,
    ext: String,
}

impl From<FetchedVideo> for GuardedDownload {
    fn from(fetched: FetchedVideo) -> Self {
        Self {
            file: ScratchFile::new(fetched.path),
            title: fetched.title,
            ext: fetched.ext,
        }
    }
}

/// Streams the scratch file as an attachment. The file is removed once the
/// body is dropped, whether or not the client received all of it.
async fn stream_download(download: GuardedDownload) -> ApiResult<Response> {
    let GuardedDownload {
        file: scratch_file,
        title,
        ext,
    } = download;
    let file = File::open(scratch_file.path()).await.map_err(|err| {
        error!(path = %scratch_file.path().display(), "could not open download: {err}");
        ApiError::internal(format!("could not open download: {err}"))
    })?;
    let length = file.metadata().await.ok().map(|metadata| metadata.len());

    let filename = attachment_filename(&title, &ext);
    let mime = MimeGuess::from_ext(&ext).first_or_octet_stream();
    let stream = CleanupStream {
        inner: ReaderStream::new(file),
        _scratch: scratch_file,
    };

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    Ok(response)
}

/// `<sanitized title>.<ext>`, ASCII only so it fits in a quoted header value.
pub fn attachment_filename(title: &str, ext: &str) -> String {
    let ext: String = ext.chars().filter(char::is_ascii_alphanumeric).collect();
    let ext = if ext.is_empty() { FALLBACK_EXT.to_string() } else { ext };
    format!("{}.{}", sanitize_title(title), ext)
}

/// Keeps ASCII letters, digits, space, hyphen and underscore, trims trailing
/// whitespace and caps the result at 100 characters.
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|&c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let truncated: String = kept.trim_end().chars().take(MAX_TITLE_CHARS).collect();
    if truncated.trim().is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        truncated
    }
}

/// Deletes its file on drop.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "removed scratch file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), "could not remove scratch file: {err}"),
        }
    }
}

/// File body that owns the scratch file guard, so the file lives exactly as
/// long as the response body.
struct CleanupStream {
    inner: ReaderStream<File>,
    _scratch: ScratchFile,
}

impl Stream for CleanupStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
