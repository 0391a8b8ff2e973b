//! Process-wide transcription state.
//!
//! Holds the recognizer handle and the immutable recognition settings that
//! every request shares, and wires the chunker into the relay.

use std::sync::Arc;

use log::info;
use tokio::io::AsyncRead;

use super::backends::google::DEFAULT_ENDPOINT;
use super::backends::{GoogleSpeechRecognizer, StreamingRecognizer};
use super::{frame_stream, relay, EventStream, RecognitionConfig};

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionBackendConfig {
    /// Google Cloud Speech-to-Text v1 over gRPC
    Google { endpoint: String },
}

impl Default for TranscriptionBackendConfig {
    fn default() -> Self {
        Self::Google {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// Configuration for the transcription manager.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptionConfig {
    pub backend: TranscriptionBackendConfig,
    pub recognition: RecognitionConfig,
}

impl TranscriptionConfig {
    /// Google backend at a custom endpoint, with the default recognition settings.
    pub fn google(endpoint: &str) -> Self {
        Self {
            backend: TranscriptionBackendConfig::Google {
                endpoint: endpoint.to_string(),
            },
            ..Default::default()
        }
    }
}

/// Entry point for transcribing one upload.
///
/// Built once at startup and shared by reference across requests; nothing in
/// it changes after construction.
pub struct TranscriptionManager {
    recognizer: Arc<dyn StreamingRecognizer>,
    recognition: Arc<RecognitionConfig>,
}

impl TranscriptionManager {
    /// Create a manager for the configured backend.
    pub fn new(config: TranscriptionConfig) -> anyhow::Result<Self> {
        let recognizer: Arc<dyn StreamingRecognizer> = match &config.backend {
            TranscriptionBackendConfig::Google { endpoint } => {
                info!("Creating TranscriptionManager with Google Speech backend");
                Arc::new(GoogleSpeechRecognizer::connect_lazy(endpoint)?)
            }
        };
        Ok(Self::with_recognizer(recognizer, config.recognition))
    }

    /// Create a manager around an existing recognizer.
    pub fn with_recognizer(
        recognizer: Arc<dyn StreamingRecognizer>,
        recognition: RecognitionConfig,
    ) -> Self {
        Self {
            recognizer,
            recognition: Arc::new(recognition),
        }
    }

    pub fn recognition_config(&self) -> &RecognitionConfig {
        &self.recognition
    }

    /// Stream transcript events for the audio readable from `reader`.
    pub fn transcribe<R>(&self, reader: R) -> EventStream
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let frames = frame_stream(reader, self.recognition.clone());
        relay(self.recognizer.clone(), frames)
    }
}
