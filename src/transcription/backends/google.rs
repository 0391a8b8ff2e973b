//! Google Cloud Speech-to-Text v1 streaming backend.
//!
//! Talks to the `StreamingRecognize` gRPC method. The channel is created
//! lazily once per process and cloned for every call.

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::Request;

use super::{FrameStream, RecognitionStream, StreamingRecognizer};
use crate::error::{TranscribeError, TranscribeResult};
use crate::proto::speech::{
    recognition_config, speech_client::SpeechClient, streaming_recognize_request,
    RecognitionConfig as ProtoRecognitionConfig, StreamingRecognitionConfig,
    StreamingRecognizeRequest, StreamingRecognizeResponse,
};
use crate::transcription::{
    Alternative, AudioEncoding, RecognitionConfig, RecognitionResponse, RecognitionResult,
    StreamFrame,
};

pub const DEFAULT_ENDPOINT: &str = "https://speech.googleapis.com";

/// Streaming recognizer backed by the Speech-to-Text gRPC API.
///
/// Credentials are expected to be handled by the hosting environment.
///
/// # Example
/// ```ignore
/// let recognizer = GoogleSpeechRecognizer::connect_lazy(DEFAULT_ENDPOINT)?;
/// let responses = recognizer.streaming_recognize(frames).await?;
/// ```
#[derive(Clone)]
pub struct GoogleSpeechRecognizer {
    client: SpeechClient<Channel>,
}

impl GoogleSpeechRecognizer {
    /// Create a recognizer without connecting; the first call dials the endpoint.
    ///
    /// `https` endpoints use TLS with the platform's root certificates.
    /// Must be called from within a Tokio runtime.
    pub fn connect_lazy(endpoint: &str) -> anyhow::Result<Self> {
        let mut builder = Endpoint::from_shared(endpoint.to_string())?;
        if builder.uri().scheme_str() == Some("https") {
            builder = builder.tls_config(ClientTlsConfig::new().with_native_roots())?;
        }

        info!("Using speech recognition endpoint {}", endpoint);

        Ok(Self {
            client: SpeechClient::new(builder.connect_lazy()),
        })
    }
}

#[async_trait]
impl StreamingRecognizer for GoogleSpeechRecognizer {
    async fn streaming_recognize(&self, frames: FrameStream) -> TranscribeResult<RecognitionStream> {
        let mut client = self.client.clone();

        // The request stream handed to tonic must be a concrete receiver.
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let mut frames = frames;
            while let Some(frame) = frames.next().await {
                if tx.send(to_request(frame)).await.is_err() {
                    debug!("StreamingRecognize call closed its request stream");
                    break;
                }
            }
        });

        let response = client
            .streaming_recognize(Request::new(ReceiverStream::new(rx)))
            .await?;
        debug!("StreamingRecognize call established");

        let inbound = response
            .into_inner()
            .map(|message| message.map_err(TranscribeError::from).and_then(from_response));
        Ok(inbound.boxed())
    }
}

fn encoding(encoding: AudioEncoding) -> recognition_config::AudioEncoding {
    match encoding {
        AudioEncoding::Linear16 => recognition_config::AudioEncoding::Linear16,
    }
}

fn streaming_config(config: &RecognitionConfig) -> StreamingRecognitionConfig {
    StreamingRecognitionConfig {
        config: Some(ProtoRecognitionConfig {
            encoding: encoding(config.encoding) as i32,
            sample_rate_hertz: config.sample_rate_hertz as i32,
            language_code: config.language_code.clone(),
            ..Default::default()
        }),
        single_utterance: false,
        interim_results: config.interim_results,
    }
}

fn to_request(frame: StreamFrame) -> StreamingRecognizeRequest {
    let request = match frame {
        StreamFrame::Config(config) => {
            streaming_recognize_request::StreamingRequest::StreamingConfig(streaming_config(&config))
        }
        StreamFrame::Audio(audio) => streaming_recognize_request::StreamingRequest::AudioContent(audio),
    };
    StreamingRecognizeRequest {
        streaming_request: Some(request),
    }
}

/// Convert a wire response, surfacing an embedded error status as a failure.
fn from_response(response: StreamingRecognizeResponse) -> TranscribeResult<RecognitionResponse> {
    if let Some(status) = response.error.filter(|status| status.code != 0) {
        return Err(TranscribeError::Recognition(format!(
            "{} (code {})",
            status.message, status.code
        )));
    }

    let results = response
        .results
        .into_iter()
        .map(|result| RecognitionResult {
            alternatives: result
                .alternatives
                .into_iter()
                .map(|alternative| Alternative {
                    transcript: alternative.transcript,
                    confidence: alternative.confidence,
                })
                .collect(),
            is_final: result.is_final,
        })
        .collect();

    Ok(RecognitionResponse { results })
}
