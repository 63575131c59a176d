//! Chunk codec: fixed-duration slicing and reconstruction of audio.
//!
//! Long tracks are persisted as a sequence of [`AudioChunk`]s, each covering
//! `chunk_duration` seconds of every channel. Playback pulls the chunks back in
//! order and turns each into an [`AudioBuffer`] for scheduling.
//!
//! ```text
//!  AudioBuffer (N frames) ──encode──▶ [chunk 0][chunk 1] … [chunk k (≤ window)]
//!                                        │
//!                                        └──decode──▶ AudioBuffer (window frames)
//! ```
//!
//! Starting playback mid-track uses [`locate`] to find the first chunk and the
//! in-chunk position, then [`offset`] to trim that chunk's head.
//!
//! # Example
//!
//! ```rust
//! use segue_core::{AudioBuffer, chunk};
//!
//! let buffer = AudioBuffer::silent(1, 44100 * 30, 44100);
//! let chunks = chunk::encode(&buffer, "track", 10.0).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[2].frame_count(), 441_000);
//! ```

use crate::buffer::{AudioBuffer, check_channel_lengths};

/// Errors produced by the chunk codec.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkError {
    /// Channel arrays disagree in length.
    ChannelLengthMismatch {
        /// Index of the first offending channel.
        channel: usize,
        /// Length of channel 0.
        expected: usize,
        /// Length of the offending channel.
        actual: usize,
    },
    /// A chunk needs at least one channel.
    NoChannels,
    /// Sample rate of zero.
    InvalidSampleRate,
    /// Chunk duration that yields a window of zero frames (or is not finite).
    InvalidDuration(f64),
    /// Negative or non-finite trim offset.
    InvalidOffset(f64),
}

impl core::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ChannelLengthMismatch {
                channel,
                expected,
                actual,
            } => write!(
                f,
                "channel {channel} has {actual} frames, expected {expected}"
            ),
            Self::NoChannels => write!(f, "audio must have at least one channel"),
            Self::InvalidSampleRate => write!(f, "sample rate must be non-zero"),
            Self::InvalidDuration(d) => write!(f, "invalid chunk duration {d}s"),
            Self::InvalidOffset(o) => write!(f, "invalid chunk offset {o}s"),
        }
    }
}

impl std::error::Error for ChunkError {}

/// A fixed-duration slice of one stream's decoded audio.
///
/// Identity is `(stream_id, chunk_index)`. Chunks are immutable once built;
/// [`offset`] returns a new chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    stream_id: String,
    chunk_index: u32,
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioChunk {
    /// Creates a chunk, validating the channel layout.
    pub fn new(
        stream_id: impl Into<String>,
        chunk_index: u32,
        channels: Vec<Vec<f32>>,
        sample_rate: u32,
    ) -> Result<Self, ChunkError> {
        if channels.is_empty() {
            return Err(ChunkError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(ChunkError::InvalidSampleRate);
        }
        check_channel_lengths(&channels)?;
        Ok(Self {
            stream_id: stream_id.into(),
            chunk_index,
            channels,
            sample_rate,
        })
    }

    /// Identifier of the stream (track) this chunk belongs to.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Position of this chunk within its stream, starting at 0.
    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    /// Samples per channel.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    /// Number of channels.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playback length: `frame_count / sample_rate` seconds.
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Planar channel data.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }
}

/// Where a playback offset lands in a chunked track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkPosition {
    /// First chunk to read.
    pub chunk_index: u32,
    /// Seconds to trim from the head of that chunk (rounded to centiseconds).
    pub within_secs: f64,
}

/// Number of frames in one chunk window: `floor(sample_rate * chunk_duration)`.
pub fn window_frames(sample_rate: u32, chunk_duration_secs: f64) -> Result<usize, ChunkError> {
    if !chunk_duration_secs.is_finite() || chunk_duration_secs <= 0.0 {
        return Err(ChunkError::InvalidDuration(chunk_duration_secs));
    }
    let window = (sample_rate as f64 * chunk_duration_secs).floor() as usize;
    if window == 0 {
        return Err(ChunkError::InvalidDuration(chunk_duration_secs));
    }
    Ok(window)
}

/// Slices `buffer` into consecutive chunks of `chunk_duration_secs`.
///
/// Every chunk except possibly the last holds exactly
/// [`window_frames`] frames; the last holds whatever remains. Indices start at
/// 0 and follow slice order. An empty buffer yields no chunks.
pub fn encode(
    buffer: &AudioBuffer,
    stream_id: &str,
    chunk_duration_secs: f64,
) -> Result<Vec<AudioChunk>, ChunkError> {
    if buffer.channel_count() == 0 {
        return Err(ChunkError::NoChannels);
    }
    check_channel_lengths(buffer.channels())?;
    let window = window_frames(buffer.sample_rate(), chunk_duration_secs)?;
    let frames = buffer.frame_count();

    let chunks = (0..frames.div_ceil(window))
        .map(|index| {
            let start = index * window;
            let end = (start + window).min(frames);
            let channels = buffer
                .channels()
                .iter()
                .map(|channel| channel[start..end].to_vec())
                .collect();
            AudioChunk {
                stream_id: stream_id.to_string(),
                chunk_index: index as u32,
                channels,
                sample_rate: buffer.sample_rate(),
            }
        })
        .collect::<Vec<_>>();

    #[cfg(feature = "tracing")]
    tracing::debug!(
        stream = stream_id,
        chunks = chunks.len(),
        window,
        "encoded audio into chunks"
    );
    Ok(chunks)
}

/// Rebuilds a playable buffer from a chunk, copying every sample.
pub fn decode(chunk: &AudioChunk) -> AudioBuffer {
    AudioBuffer::from_validated(chunk.channels.clone(), chunk.sample_rate)
}

/// Trims `round(offset_secs * sample_rate)` frames from the head of every
/// channel. Trimming past the end leaves an empty chunk.
pub fn offset(chunk: &AudioChunk, offset_secs: f64) -> Result<AudioChunk, ChunkError> {
    if !offset_secs.is_finite() || offset_secs < 0.0 {
        return Err(ChunkError::InvalidOffset(offset_secs));
    }
    let trim = ((offset_secs * chunk.sample_rate as f64).round() as usize).min(chunk.frame_count());
    Ok(AudioChunk {
        stream_id: chunk.stream_id.clone(),
        chunk_index: chunk.chunk_index,
        channels: chunk
            .channels
            .iter()
            .map(|channel| channel[trim..].to_vec())
            .collect(),
        sample_rate: chunk.sample_rate,
    })
}

/// Maps a track offset to the chunk that contains it.
///
/// `chunk_index = floor(offset / duration)`; the in-chunk remainder is rounded
/// to two decimals so stores trim on a stable centisecond grid.
pub fn locate(offset_secs: f64, chunk_duration_secs: f64) -> Result<ChunkPosition, ChunkError> {
    if !chunk_duration_secs.is_finite() || chunk_duration_secs <= 0.0 {
        return Err(ChunkError::InvalidDuration(chunk_duration_secs));
    }
    if !offset_secs.is_finite() || offset_secs < 0.0 {
        return Err(ChunkError::InvalidOffset(offset_secs));
    }
    let chunk_index = (offset_secs / chunk_duration_secs).floor() as u32;
    let within_secs = ((offset_secs % chunk_duration_secs) * 100.0).round() / 100.0;
    Ok(ChunkPosition {
        chunk_index,
        within_secs,
    })
}
