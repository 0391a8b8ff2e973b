//! Recognition relay.
//!
//! Drives one bidirectional recognition call per request: frames from the
//! chunker go out on one half, results come back on the other, and every
//! result entry is forwarded as a `TranscriptEvent` through a bounded
//! channel that the HTTP body pulls from.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::backends::StreamingRecognizer;
use super::{StreamFrame, TranscriptEvent};
use crate::error::TranscribeResult;

/// Transcript events of one request, ending with at most one error.
pub type EventStream = ReceiverStream<TranscribeResult<TranscriptEvent>>;

/// Events buffered ahead of the HTTP writer.
const EVENT_QUEUE: usize = 16;

/// Frames buffered ahead of the transport.
const FRAME_QUEUE: usize = 4;

/// Start relaying `frames` through `recognizer`.
///
/// The call runs on its own task and stops as soon as the returned stream is
/// dropped. A failure is delivered as the last item, after every event that
/// was already produced.
pub fn relay<F>(recognizer: Arc<dyn StreamingRecognizer>, frames: F) -> EventStream
where
    F: Stream<Item = TranscribeResult<StreamFrame>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_QUEUE);

    tokio::spawn(async move {
        if let Err(e) = drive(recognizer.as_ref(), frames, &tx).await {
            warn!("Recognition relay failed: {}", e);
            let _ = tx.send(Err(e)).await;
        }
    });

    ReceiverStream::new(rx)
}

/// Feeds chunker output into the call's outbound channel.
struct Outbound<F> {
    frames: Pin<Box<F>>,
    tx: Option<mpsc::Sender<StreamFrame>>,
}

impl<F> Outbound<F>
where
    F: Stream<Item = TranscribeResult<StreamFrame>>,
{
    fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    /// Move one frame to the transport, closing the outbound half at the end.
    ///
    /// Cancel safe: the channel slot is reserved before a frame is taken.
    async fn pump(&mut self) -> TranscribeResult<()> {
        let Some(tx) = self.tx.clone() else {
            return Ok(());
        };

        let permit = match tx.reserve().await {
            Ok(permit) => permit,
            Err(_) => {
                debug!("Recognition call stopped accepting audio");
                self.tx = None;
                return Ok(());
            }
        };

        match self.frames.next().await {
            Some(Ok(frame)) => permit.send(frame),
            Some(Err(e)) => return Err(e),
            None => {
                debug!("All frames sent, half-closing recognition call");
                self.tx = None;
            }
        }
        Ok(())
    }
}

async fn drive<F>(
    recognizer: &dyn StreamingRecognizer,
    frames: F,
    events: &mpsc::Sender<TranscribeResult<TranscriptEvent>>,
) -> TranscribeResult<()>
where
    F: Stream<Item = TranscribeResult<StreamFrame>> + Send,
{
    let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE);
    let mut outbound = Outbound {
        frames: Box::pin(frames),
        tx: Some(frame_tx),
    };

    let call = recognizer.streaming_recognize(ReceiverStream::new(frame_rx).boxed());
    tokio::pin!(call);

    // The service may wait for audio before answering, keep feeding it.
    let mut responses = loop {
        tokio::select! {
            opened = &mut call => break opened?,
            pumped = outbound.pump(), if outbound.is_open() => pumped?,
            _ = events.closed() => {
                debug!("Client went away before the recognition call opened");
                return Ok(());
            }
        }
    };

    let mut forwarded = 0usize;
    loop {
        tokio::select! {
            pumped = outbound.pump(), if outbound.is_open() => pumped?,
            _ = events.closed() => {
                debug!("Client went away, cancelling recognition call");
                return Ok(());
            }
            message = responses.next() => {
                let Some(message) = message else {
                    info!("Recognition finished after {} events", forwarded);
                    return Ok(());
                };
                for result in message?.results {
                    if events.send(Ok(result.into())).await.is_err() {
                        debug!("Client went away, cancelling recognition call");
                        return Ok(());
                    }
                    forwarded += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscribeError;
    use crate::transcription::backends::testing::{
        ScriptedRecognizer, SilentRecognizer, UnavailableRecognizer,
    };
    use crate::transcription::{
        frame_stream, Alternative, FrameStream, RecognitionConfig, RecognitionResponse,
        RecognitionResult, RecognitionStream, CHUNK_SIZE,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::io::Cursor;
    use std::time::Duration;

    /// Never finishes opening the call.
    #[derive(Default)]
    struct StalledRecognizer {
        calls: Arc<()>,
    }

    #[async_trait]
    impl StreamingRecognizer for StalledRecognizer {
        async fn streaming_recognize(&self, _frames: FrameStream) -> TranscribeResult<RecognitionStream> {
            let _call = self.calls.clone();
            futures_util::future::pending().await
        }
    }

    fn response(transcript: &str, confidence: f32, is_final: bool) -> RecognitionResponse {
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

    fn frames_for(audio: Vec<u8>) -> impl Stream<Item = TranscribeResult<StreamFrame>> + Send + 'static {
        frame_stream(
            Cursor::new(Bytes::from(audio)),
            Arc::new(RecognitionConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_interim_then_final() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            Ok(response("hel", 0.0, false)),
            Ok(response("hello", 0.95, true)),
        ]));

        let events: Vec<_> = relay(recognizer, frames_for(vec![0u8; 100])).collect().await;

        assert_eq!(events.len(), 2);
        let first = events[0].as_ref().unwrap();
        assert_eq!(first.alternatives[0].transcript, "hel");
        assert!(!first.is_final);
        let second = events[1].as_ref().unwrap();
        assert_eq!(second.alternatives[0].transcript, "hello");
        assert_eq!(second.alternatives[0].confidence, 0.95);
        assert!(second.is_final);
    }

    #[tokio::test]
    async fn test_one_event_per_result_entry() {
        let mut message = response("one", 0.5, true);
        message.results.push(RecognitionResult {
            alternatives: vec![],
            is_final: false,
        });
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            Ok(RecognitionResponse::default()),
            Ok(message),
        ]));

        let events: Vec<_> = relay(recognizer, frames_for(Vec::new())).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().alternatives.len(), 1);
        assert!(events[1].as_ref().unwrap().alternatives.is_empty());
    }

    #[tokio::test]
    async fn test_failure_after_first_message() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            Ok(response("partial", 0.0, false)),
            Err(TranscribeError::Recognition("connection reset".into())),
        ]));

        let events: Vec<_> = relay(recognizer, frames_for(vec![1u8; 10])).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().alternatives[0].transcript, "partial");
        match &events[1] {
            Err(TranscribeError::Recognition(cause)) => assert_eq!(cause, "connection reset"),
            other => panic!("expected recognition failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_that_cannot_open() {
        let events: Vec<_> = relay(Arc::new(UnavailableRecognizer), frames_for(vec![1u8; 10]))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(TranscribeError::Recognition(_))));
    }

    #[tokio::test]
    async fn test_frames_sent_in_order() {
        let audio: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 256) as u8).collect();
        let recognizer = Arc::new(ScriptedRecognizer::draining(vec![Ok(response(
            "done", 0.8, true,
        ))]));

        let events: Vec<_> = relay(recognizer.clone(), frames_for(audio.clone())).collect().await;
        assert_eq!(events.len(), 1);

        let received = recognizer.received.lock().unwrap();
        assert_eq!(received.len(), 5);
        assert!(matches!(received[0], StreamFrame::Config(_)));
        let sent: Vec<u8> = received[1..]
            .iter()
            .flat_map(|frame| match frame {
                StreamFrame::Audio(bytes) => bytes.to_vec(),
                StreamFrame::Config(_) => panic!("second config frame"),
            })
            .collect();
        assert_eq!(sent, audio);
    }

    #[tokio::test]
    async fn test_read_failure_is_reported() {
        let frames = futures_util::stream::iter(vec![
            Ok(StreamFrame::Config(Arc::new(RecognitionConfig::default()))),
            Err(TranscribeError::Read(std::io::Error::new(
                std::io::ErrorKind::Other,
                "bad sector",
            ))),
        ]);
        let recognizer = Arc::new(ScriptedRecognizer::draining(vec![Ok(response(
            "never", 1.0, true,
        ))]));

        let events: Vec<_> = relay(recognizer, frames).collect().await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            Err(err @ TranscribeError::Read(_)) => {
                assert_eq!(err.to_string(), "Error reading audio: bad sector")
            }
            other => panic!("expected read failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_drop_cancels_silent_call() {
        let recognizer = Arc::new(SilentRecognizer::default());

        let events = relay(recognizer.clone(), frames_for(vec![0u8; CHUNK_SIZE * 8]));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(Arc::strong_count(&recognizer.calls), 2);

        drop(events);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(Arc::strong_count(&recognizer.calls), 1);
    }

    #[tokio::test]
    async fn test_client_drop_cancels_call_being_opened() {
        let recognizer = Arc::new(StalledRecognizer::default());

        let events = relay(recognizer.clone(), frames_for(vec![0u8; 10]));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(Arc::strong_count(&recognizer.calls), 2);

        drop(events);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(Arc::strong_count(&recognizer.calls), 1);
    }
}
