//! Chunk sequences produced by streaming completions.
//!
//! ```rust
//! use rprovider::{BoxedChunkStream, ChatChunk, VecChunkStream};
//!
//! let stream = VecChunkStream::new(vec![Ok(ChatChunk::text("hello"))]);
//! let _boxed: BoxedChunkStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::{ChatChunk, TransportError};

/// Async chunk stream contract.
///
/// Chunks arrive in source order. Once the stream yields `None` it must not
/// yield again.
pub trait ChunkStream: Stream<Item = Result<ChatChunk, TransportError>> + Send {}

impl<T> ChunkStream for T where T: Stream<Item = Result<ChatChunk, TransportError>> + Send {}

pub type BoxedChunkStream<'a> = Pin<Box<dyn ChunkStream + 'a>>;

/// Blocking chunk iterator returned by [`ProviderClient::completion`](crate::ProviderClient::completion).
pub type ChunkIter = Box<dyn Iterator<Item = Result<ChatChunk, TransportError>> + Send>;

#[derive(Debug)]
pub struct VecChunkStream {
    chunks: VecDeque<Result<ChatChunk, TransportError>>,
}

impl VecChunkStream {
    pub fn new(chunks: Vec<Result<ChatChunk, TransportError>>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }
}

impl Stream for VecChunkStream {
    type Item = Result<ChatChunk, TransportError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<ChatChunk, TransportError>>> {
        Poll::Ready(self.chunks.pop_front())
    }
}
