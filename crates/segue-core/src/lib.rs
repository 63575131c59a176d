//! Segue Core - chunk codec and processing graph for gapless chunked playback
//!
//! This crate holds the I/O-free half of segue: how long tracks are sliced
//! into fixed-duration chunks and rebuilt, and how each playing segment's
//! signal path is represented and rewired while audio is in flight.
//!
//! # Core Abstractions
//!
//! ## Audio Data
//!
//! - [`AudioBuffer`] - Planar multi-channel samples with a sample rate
//! - [`AudioChunk`] - One fixed-duration slice of a stream, identified by
//!   `(stream_id, chunk_index)`
//! - [`chunk`] - `encode`, `decode`, `offset`, `locate`
//!
//! ## Processing Graph
//!
//! - [`Graph`] - Arena of nodes with one input and one output, mirrored onto
//!   clock-owned units through a [`Patchbay`]
//! - [`insert_node_between`] / [`remove_node`] - Live splice helpers
//!
//! ## Effects
//!
//! - [`Effect`] - Object-safe mono processor trait
//! - [`OnePole`] - 6 dB/oct lowpass
//!
//! # Feature Flags
//!
//! - `tracing`: emit `tracing::debug!` events for chunk encoding and graph
//!   mutations.
//!
//! # Example
//!
//! ```rust
//! use segue_core::{AudioBuffer, chunk};
//!
//! let buffer = AudioBuffer::silent(2, 48000 * 25, 48000);
//! let chunks = chunk::encode(&buffer, "intro", 10.0).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[2].duration_secs(), 5.0);
//!
//! let start = chunk::locate(12.5, 10.0).unwrap();
//! assert_eq!(start.chunk_index, 1);
//! let trimmed = chunk::offset(&chunks[1], start.within_secs).unwrap();
//! assert_eq!(trimmed.frame_count(), 48000 * 15 / 2);
//! ```

pub mod buffer;
pub mod chunk;
pub mod effect;
pub mod graph;
pub mod math;
pub mod one_pole;

pub use buffer::AudioBuffer;
pub use chunk::{AudioChunk, ChunkError, ChunkPosition};
pub use effect::Effect;
pub use graph::{
    Graph, GraphError, GraphNode, NodeId, Patchbay, Rewire, UnitId, insert_node_between,
    remove_node,
};
pub use math::flush_denormal;
pub use one_pole::OnePole;
