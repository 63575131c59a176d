//! CLI command implementations.

pub mod common;
pub mod devices;
pub mod ingest;
pub mod play;
pub mod render;
pub mod tracks;
