//! Transcription relay for streaming speech recognition.
//!
//! This module bridges a buffered audio upload to a bidirectional streaming
//! recognition call. It handles:
//! - Framing the upload into a configuration frame plus fixed-size audio frames
//! - Driving the duplex recognition call from a single task per request
//! - Reshaping incremental results into JSON-ready transcript events

pub mod backends;
mod chunker;
mod manager;
mod relay;

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use backends::{FrameStream, GoogleSpeechRecognizer, RecognitionStream, StreamingRecognizer};
pub use chunker::frame_stream;
pub use manager::{TranscriptionBackendConfig, TranscriptionConfig, TranscriptionManager};
pub use relay::{relay, EventStream};

/// Maximum number of audio bytes carried by one frame.
pub const CHUNK_SIZE: usize = 8192;

/// Uploads are interpreted as 16kHz, mono, S16_LE PCM
pub const SAMPLE_RATE_HERTZ: u32 = 16000;

pub const LANGUAGE_CODE: &str = "en-US";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    /// Uncompressed 16-bit signed little-endian samples
    Linear16,
}

/// Settings sent once, at the head of every recognition call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionConfig {
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    /// Ask the service for not-yet-final hypotheses as well
    pub interim_results: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            encoding: AudioEncoding::Linear16,
            sample_rate_hertz: SAMPLE_RATE_HERTZ,
            language_code: LANGUAGE_CODE.to_string(),
            interim_results: true,
        }
    }
}

/// One outbound message of the recognition call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Always the first frame of a call
    Config(Arc<RecognitionConfig>),
    /// Between 1 and `CHUNK_SIZE` bytes of audio, in upload order
    Audio(Bytes),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: f32,
}

/// One result entry reported by the recognition service.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Alternatives in the order the service ranked them
    pub alternatives: Vec<Alternative>,
    pub is_final: bool,
}

/// One inbound message of the recognition call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionResponse {
    pub results: Vec<RecognitionResult>,
}

/// The JSON record streamed to the HTTP client for each recognition result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub alternatives: Vec<Alternative>,
    pub is_final: bool,
}

impl From<RecognitionResult> for TranscriptEvent {
    fn from(result: RecognitionResult) -> Self {
        Self {
            alternatives: result.alternatives,
            is_final: result.is_final,
        }
    }
}
