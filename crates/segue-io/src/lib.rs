//! Playback and storage layer for segue.
//!
//! This crate provides:
//!
//! - **Playback clock**: the [`PlaybackClock`] trait and its software
//!   implementation [`RenderContext`]
//! - **Chunk sources and stores**: [`ChunkSource`], [`ChunkStore`],
//!   [`MemoryChunkStore`] and the on-disk [`DirChunkStore`]
//! - **WAV I/O**: [`read_wav_buffer`], [`write_wav_buffer`] and [`ingest_wav`]
//! - **Stream orchestration**: [`StreamOrchestrator`] pulls chunks, schedules
//!   them back-to-back and exposes pause/resume/stop/volume/subscribe
//! - **Audio output**: the [`AudioBackend`](backend::AudioBackend) trait and
//!   its cpal implementation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::atomic::AtomicBool;
//! use segue_io::{ChunkStore, DirChunkStore, StreamOrchestrator};
//!
//! let store = DirChunkStore::open_root("tracks")?;
//! let mut player = StreamOrchestrator::new();
//! player.set_reader(store.open("intro", 12.5)?);
//! player.stream(0.1);
//! // feed player.clock().render(..) from an output callback, then:
//! player.run(&AtomicBool::new(false))?;
//! ```

pub mod backend;
pub mod clock;
pub mod context;
pub mod cpal_backend;
pub mod orchestrator;
pub mod source;
pub mod store;
mod wav;

pub use backend::AudioDevice;
pub use clock::PlaybackClock;
pub use context::RenderContext;
pub use orchestrator::{
    MAX_RETAINED_SEGMENTS, Segment, StreamEvent, StreamOrchestrator, StreamPhase, StreamState,
    SubscriptionId,
};
pub use source::{ChunkSource, MemorySource, TrimFirst};
pub use store::{ChunkStore, DirChunkSource, DirChunkStore, MemoryChunkStore, TrackManifest};
pub use wav::{
    WavFormat, WavInfo, ingest_wav, read_wav_buffer, read_wav_info, write_wav_buffer,
};

/// Error types for playback and storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Malformed audio data or chunk parameters.
    #[error("Chunk error: {0}")]
    Chunk(#[from] segue_core::ChunkError),

    /// Graph mutation rejected.
    #[error("Graph error: {0}")]
    Graph(#[from] segue_core::GraphError),

    /// The chunk source failed to produce the next chunk.
    #[error("Chunk source error: {0}")]
    Source(String),

    /// No track with this id in the store.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// Chunks or track id rejected by the store.
    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    /// Track manifest could not be read or written.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for playback and storage operations.
pub type Result<T> = std::result::Result<T, Error>;
