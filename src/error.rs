//! Error types shared between the extractor adapter, the orchestrator and the
//! HTTP layer.

use std::io;
use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures reported by an [`Extractor`](crate::extractor::Extractor).
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The requested format selector matched nothing for this video.
    #[error("{0}")]
    FormatUnavailable(String),
    /// The extractor ran but refused the URL (unsupported site, removed
    /// video, network failure on its side).
    #[error("{0}")]
    Rejected(String),
    #[error("could not run the extractor: {0}")]
    Spawn(#[source] io::Error),
    #[error("unexpected extractor output: {0}")]
    InvalidOutput(String),
}

impl ExtractError {
    /// True when the caller can fix the problem by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::FormatUnavailable(_) | Self::Rejected(_))
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("download reported success but {} is missing", .0.display())]
    Incomplete(PathBuf),
    #[error("scratch directory error: {0}")]
    Io(#[from] io::Error),
}

/// JSON error envelope returned by every endpoint.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        if err.is_client_error() {
            Self::bad_request(format!("video could not be loaded: {err}"))
        } else {
            Self::internal(format!("server error: {err}"))
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::Extraction(inner) if inner.is_client_error() => {
                Self::bad_request(format!("video could not be downloaded: {inner}"))
            }
            other => Self::internal(format!("download error: {other}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
