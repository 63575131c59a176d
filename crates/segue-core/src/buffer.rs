//! Planar, multi-channel sample buffer.
//!
//! [`AudioBuffer`] is the playable form of audio in segue: one `Vec<f32>` per
//! channel, all of equal length, tagged with a sample rate. It is what the
//! decoder produces, what [`encode`](crate::chunk::encode) slices into chunks,
//! and what [`decode`](crate::chunk::decode) rebuilds from a chunk.

use crate::chunk::ChunkError;

/// A planar multi-channel audio buffer.
///
/// # Invariants
///
/// - Every channel holds exactly [`frame_count()`](Self::frame_count) samples.
/// - `sample_rate > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a buffer from planar channel data.
    ///
    /// Returns [`ChunkError::ChannelLengthMismatch`] if the channels differ in
    /// length and [`ChunkError::InvalidSampleRate`] for a zero sample rate.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, ChunkError> {
        if sample_rate == 0 {
            return Err(ChunkError::InvalidSampleRate);
        }
        check_channel_lengths(&channels)?;
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Wraps channels already known to satisfy the buffer invariants.
    pub(crate) fn from_validated(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Creates a silent buffer with `channel_count` channels of `frames` samples.
    pub fn silent(channel_count: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channel_count],
            sample_rate: sample_rate.max(1),
        }
    }

    /// Builds a planar buffer from interleaved samples (`[L0, R0, L1, R1, ...]`).
    ///
    /// Trailing samples that do not fill a whole frame are dropped.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, ChunkError> {
        if channel_count == 0 {
            return Err(ChunkError::NoChannels);
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::new(channels, sample_rate)
    }

    /// Interleaves the channels into a single vector.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let count = self.channel_count();
        let mut out = Vec::with_capacity(self.frame_count() * count);
        for i in 0..self.frame_count() {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }

    /// Number of sample frames (samples per channel).
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
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

    /// Playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Samples of channel `index`, or `None` if out of range.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// All channels, in order.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Consumes the buffer and returns its channel data.
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}

/// Rejects channel sets whose lengths disagree.
pub(crate) fn check_channel_lengths(channels: &[Vec<f32>]) -> Result<(), ChunkError> {
    if let Some(first) = channels.first() {
        let expected = first.len();
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != expected)
        {
            return Err(ChunkError::ChannelLengthMismatch {
                channel: index,
                expected,
                actual: channel.len(),
            });
        }
    }
    Ok(())
}
