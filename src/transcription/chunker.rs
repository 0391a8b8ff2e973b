//! Framing of a buffered upload into recognition call frames.
//!
//! The recognition protocol expects a single configuration message followed
//! by raw audio messages. This module turns any async reader into that
//! sequence, reading at most `CHUNK_SIZE` bytes per audio frame.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{RecognitionConfig, StreamFrame, CHUNK_SIZE};
use crate::error::{TranscribeError, TranscribeResult};

enum ChunkState<R> {
    Config(R, Arc<RecognitionConfig>),
    Audio(R),
    Done,
}

/// Build the frame sequence for one recognition call.
///
/// The configuration frame is always yielded first, even for an empty
/// reader. Each following read of up to `CHUNK_SIZE` bytes becomes one audio
/// frame; the first zero-length read ends the sequence. A failed read yields
/// `TranscribeError::Read` and nothing after it.
pub fn frame_stream<R>(
    reader: R,
    config: Arc<RecognitionConfig>,
) -> impl Stream<Item = TranscribeResult<StreamFrame>> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(ChunkState::Config(reader, config), |state| async move {
        match state {
            ChunkState::Config(reader, config) => {
                Some((Ok(StreamFrame::Config(config)), ChunkState::Audio(reader)))
            }
            ChunkState::Audio(mut reader) => {
                let mut chunk = vec![0u8; CHUNK_SIZE];
                match reader.read(&mut chunk).await {
                    Ok(0) => {
                        debug!("Audio buffer exhausted");
                        None
                    }
                    Ok(n) => {
                        chunk.truncate(n);
                        trace!("Framed {} audio bytes", n);
                        Some((Ok(StreamFrame::Audio(Bytes::from(chunk))), ChunkState::Audio(reader)))
                    }
                    Err(e) => Some((Err(TranscribeError::Read(e)), ChunkState::Done)),
                }
            }
            ChunkState::Done => None,
        }
    })
}
