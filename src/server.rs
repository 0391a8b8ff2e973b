//! HTTP surface: `POST /transcribe` plus the service description.

use std::future::Future;
use std::io::{self, Cursor};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use futures_util::{stream, Stream, StreamExt};
use log::{error, info};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::error::{ApiError, TranscribeError, TranscribeResult};
use crate::transcription::{TranscriptEvent, TranscriptionManager};

pub const STREAM_JSON: &str = "application/stream+json";

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<TranscriptionManager>,
}

pub fn router(manager: Arc<TranscriptionManager>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe_audio))
        .route("/openapi.json", get(openapi))
        // Uploads are buffered whole; the size ceiling is left to the deployment.
        .layer(DefaultBodyLimit::disable())
        .with_state(AppState { manager })
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    manager: Arc<TranscriptionManager>,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(manager))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn transcribe_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let audio = read_upload(&mut multipart).await?;
    info!("Transcribing upload of {} bytes", audio.len());

    let events = state.manager.transcribe(Cursor::new(audio));
    stream_events(events).await
}

/// Buffer the `file` field of the form in memory.
async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    let mut audio = None;
    // The form is read to the end so the request body is fully consumed.
    while let Some(field) = multipart.next_field().await.map_err(read_failure)? {
        if audio.is_none() && field.name() == Some("file") {
            audio = Some(field.bytes().await.map_err(read_failure)?);
        }
    }
    audio.ok_or(ApiError::MissingFile)
}

fn read_failure(err: MultipartError) -> ApiError {
    TranscribeError::Read(io::Error::other(err.body_text())).into()
}

/// Turn relay output into the HTTP response.
///
/// The first item is awaited before anything is sent so that an early
/// failure becomes a plain 500. Each event is flushed before the next one is
/// pulled, and later failures abort the chunked body.
pub async fn stream_events<S>(mut events: S) -> Result<Response, ApiError>
where
    S: Stream<Item = TranscribeResult<TranscriptEvent>> + Unpin + Send + 'static,
{
    let first = match events.next().await {
        Some(Err(e)) => {
            error!("Transcription failed before streaming: {}", e);
            return Err(e.into());
        }
        first => first,
    };

    let chunks = stream::iter(first)
        .chain(events)
        .then(|event| async move {
            // Returning Pending once lets hyper flush the previous chunk.
            tokio::task::yield_now().await;
            event
        })
        .map(encode_event);
    Ok(([(header::CONTENT_TYPE, STREAM_JSON)], Body::from_stream(chunks)).into_response())
}

/// One standalone JSON object per chunk.
fn encode_event(event: TranscribeResult<TranscriptEvent>) -> Result<Bytes, BoxError> {
    let event = event.map_err(|e| {
        error!("Transcription stream aborted: {}", e);
        e
    })?;
    Ok(Bytes::from(serde_json::to_vec(&event)?))
}

async fn openapi() -> Json<Value> {
    Json(openapi_document())
}

fn openapi_document() -> Value {
    json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Speech Transcription API",
            "description": "Transcribes uploaded audio files with streaming speech recognition.",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/transcribe": {
                "post": {
                    "summary": "Transcribe an audio file",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "multipart/form-data": {
                                "schema": {
                                    "type": "object",
                                    "required": ["file"],
                                    "properties": {
                                        "file": {"type": "string", "format": "binary"}
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "A streaming response in JSON format.",
                            "content": {
                                STREAM_JSON: {
                                    "example": {
                                        "alternatives": [{"transcript": "string", "confidence": 0.9}],
                                        "is_final": true
                                    }
                                }
                            },
                            "headers": {
                                "Transfer-Encoding": {
                                    "description": "Indicates that the response is sent in chunks.",
                                    "schema": {"type": "string", "example": "chunked"}
                                }
                            }
                        },
                        "422": {"description": "Missing file field"},
                        "500": {"description": "Internal server error"}
                    }
                }
            }
        }
    })
}
