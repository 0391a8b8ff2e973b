//! HTTP bridge between uploaded audio files and a streaming speech
//! recognition service.

pub mod error;
pub mod proto;
pub mod server;
pub mod transcription;

pub use error::{ApiError, TranscribeError, TranscribeResult};
