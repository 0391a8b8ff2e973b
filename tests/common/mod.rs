#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio::net::TcpListener;

use speech_relay::server;
use speech_relay::transcription::{
    Alternative, FrameStream, RecognitionConfig, RecognitionResponse, RecognitionResult,
    RecognitionStream, StreamFrame, StreamingRecognizer, TranscriptionManager,
};
use speech_relay::{TranscribeError, TranscribeResult};

/// Collects every frame, then replays its script.
pub struct ScriptedRecognizer {
    script: Mutex<Option<Vec<TranscribeResult<RecognitionResponse>>>>,
    pub received: Mutex<Vec<StreamFrame>>,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<TranscribeResult<RecognitionResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Some(script)),
            received: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl StreamingRecognizer for ScriptedRecognizer {
    async fn streaming_recognize(&self, frames: FrameStream) -> TranscribeResult<RecognitionStream> {
        let frames: Vec<StreamFrame> = frames.collect().await;
        *self.received.lock().unwrap() = frames;

        let script = self
            .script
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TranscribeError::Recognition("script already used".into()))?;
        Ok(stream::iter(script).boxed())
    }
}

pub fn response(transcript: &str, confidence: f32, is_final: bool) -> RecognitionResponse {
    RecognitionResponse {
        results: vec![RecognitionResult {
            alternatives: vec![Alternative {
                transcript: transcript.into(),
                confidence,
            }],
            is_final,
        }],
    }
}

/// Start the HTTP server on an ephemeral port.
pub async fn spawn_server(recognizer: Arc<dyn StreamingRecognizer>) -> SocketAddr {
    let manager = Arc::new(TranscriptionManager::with_recognizer(
        recognizer,
        RecognitionConfig::default(),
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        server::serve(listener, manager, std::future::pending())
            .await
            .unwrap();
    });

    addr
}

pub fn audio_form(audio: Vec<u8>) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(audio)
        .file_name("audio.raw")
        .mime_str("audio/l16")
        .unwrap();
    reqwest::multipart::Form::new().part("file", part)
}
