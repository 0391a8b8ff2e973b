pub mod google;

pub use google::GoogleSpeechRecognizer;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::{RecognitionResponse, StreamFrame};
use crate::error::TranscribeResult;

/// Outbound half of a recognition call.
pub type FrameStream = BoxStream<'static, StreamFrame>;

/// Inbound half of a recognition call.
pub type RecognitionStream = BoxStream<'static, TranscribeResult<RecognitionResponse>>;

#[async_trait]
pub trait StreamingRecognizer: Send + Sync {
    /// Open one bidirectional recognition call.
    ///
    /// `frames` is polled by the transport as the call progresses; ending it
    /// half-closes the call. Returns once the call is established.
    async fn streaming_recognize(&self, frames: FrameStream) -> TranscribeResult<RecognitionStream>;
}
