use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Failure of the transcription pipeline for a single request.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// The buffered upload could not be read.
    #[error("Error reading audio: {0}")]
    Read(#[from] io::Error),
    /// The streaming recognition call failed (transport, protocol or service side).
    #[error("Error during recognition: {0}")]
    Recognition(String),
}

impl From<tonic::Status> for TranscribeError {
    fn from(status: tonic::Status) -> Self {
        Self::Recognition(format!("{} ({})", status.message(), status.code()))
    }
}

pub type TranscribeResult<T> = Result<T, TranscribeError>;

/// Errors returned by the HTTP layer before a streaming body is committed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Field required: file")]
    MissingFile,
    #[error(transparent)]
    Transcribe(#[from] TranscribeError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Transcribe(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (self.status(), body).into_response()
    }
}
