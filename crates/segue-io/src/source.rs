//! Chunk sources: ordered, cancellable producers of [`AudioChunk`]s.

use std::collections::VecDeque;

use segue_core::{AudioChunk, chunk};

use crate::Result;

/// Sequential producer of one stream's chunks.
///
/// `next_chunk` returns `Ok(None)` once the stream is exhausted or after
/// [`cancel`](Self::cancel). A source is moved into exactly one
/// orchestrator.
pub trait ChunkSource: Send {
    /// Pulls the next chunk in stream order.
    fn next_chunk(&mut self) -> Result<Option<AudioChunk>>;

    /// Stops producing chunks and releases underlying resources.
    fn cancel(&mut self) -> Result<()>;
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn next_chunk(&mut self) -> Result<Option<AudioChunk>> {
        (**self).next_chunk()
    }

    fn cancel(&mut self) -> Result<()> {
        (**self).cancel()
    }
}

/// Source over chunks already in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    chunks: VecDeque<AudioChunk>,
}

impl MemorySource {
    /// Creates a source yielding `chunks` in iteration order.
    pub fn new(chunks: impl IntoIterator<Item = AudioChunk>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
        }
    }

    /// Chunks not yet pulled.
    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }
}

impl ChunkSource for MemorySource {
    fn next_chunk(&mut self) -> Result<Option<AudioChunk>> {
        Ok(self.chunks.pop_front())
    }

    fn cancel(&mut self) -> Result<()> {
        self.chunks.clear();
        Ok(())
    }
}

/// Wraps a source and trims `offset_secs` from the head of its first chunk.
#[derive(Debug)]
pub struct TrimFirst<S> {
    inner: S,
    offset_secs: f64,
    trimmed: bool,
}

impl<S: ChunkSource> TrimFirst<S> {
    /// Wraps `inner`; the first chunk it yields loses `offset_secs` seconds.
    pub fn new(inner: S, offset_secs: f64) -> Self {
        Self {
            inner,
            offset_secs,
            trimmed: false,
        }
    }

    /// Unwraps the inner source.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ChunkSource> ChunkSource for TrimFirst<S> {
    fn next_chunk(&mut self) -> Result<Option<AudioChunk>> {
        let Some(next) = self.inner.next_chunk()? else {
            return Ok(None);
        };
        if self.trimmed {
            return Ok(Some(next));
        }
        self.trimmed = true;
        if self.offset_secs > 0.0 {
            Ok(Some(chunk::offset(&next, self.offset_secs)?))
        } else {
            Ok(Some(next))
        }
    }

    fn cancel(&mut self) -> Result<()> {
        self.inner.cancel()
    }
}
