//! Chunk stores: where ingested tracks live between sessions.
//!
//! A store keeps each track as its chunk sequence plus a [`TrackManifest`].
//! [`ChunkStore::open`] turns a playback offset into a source positioned on
//! the right chunk, with the head of that chunk trimmed:
//!
//! ```text
//! offset 23.25s, chunk 10s  ──locate──▶ chunk 2, trim 3.25s
//!                           ──open────▶ TrimFirst([chunk 2, chunk 3, …])
//! ```
//!
//! ## On-disk layout ([`DirChunkStore`])
//!
//! ```text
//! <root>/
//!   <track_id>/
//!     track.toml           manifest
//!     chunk-000000.wav     32-bit float, all channels
//!     chunk-000001.wav
//!     …
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use segue_core::{AudioChunk, chunk};
use serde::{Deserialize, Serialize};

use crate::source::{ChunkSource, MemorySource, TrimFirst};
use crate::wav::{read_wav_buffer, write_wav_buffer};
use crate::{Error, Result};

const MANIFEST_FILE: &str = "track.toml";

/// Summary of a stored track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackManifest {
    /// Track identifier; also every chunk's `stream_id`.
    pub track_id: String,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Duration of every chunk but the last.
    pub chunk_duration_secs: f64,
    /// Number of stored chunks.
    pub chunk_count: u32,
    /// Total samples per channel across all chunks.
    pub frame_count: u64,
}

impl TrackManifest {
    /// Track length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.sample_rate as f64
    }

    /// Checks that `chunks` form one contiguous track and summarises them.
    fn describe(track_id: &str, chunks: &[AudioChunk], chunk_duration_secs: f64) -> Result<Self> {
        validate_track_id(track_id)?;
        if !chunk_duration_secs.is_finite() || chunk_duration_secs <= 0.0 {
            return Err(segue_core::ChunkError::InvalidDuration(chunk_duration_secs).into());
        }
        let (sample_rate, channels) = chunks
            .first()
            .map_or((0, 0), |c| (c.sample_rate(), c.channel_count() as u16));
        for (i, c) in chunks.iter().enumerate() {
            if c.stream_id() != track_id {
                return Err(Error::InvalidTrack(format!(
                    "chunk {i} belongs to '{}', not '{track_id}'",
                    c.stream_id()
                )));
            }
            if c.chunk_index() as usize != i {
                return Err(Error::InvalidTrack(format!(
                    "expected chunk index {i}, found {}",
                    c.chunk_index()
                )));
            }
            if c.sample_rate() != sample_rate || c.channel_count() as u16 != channels {
                return Err(Error::InvalidTrack(format!(
                    "chunk {i} changes format to {} Hz / {} channels",
                    c.sample_rate(),
                    c.channel_count()
                )));
            }
        }
        Ok(Self {
            track_id: track_id.to_string(),
            sample_rate,
            channels,
            chunk_duration_secs,
            chunk_count: chunks.len() as u32,
            frame_count: chunks.iter().map(|c| c.frame_count() as u64).sum(),
        })
    }
}

/// Persistent home for chunked tracks.
pub trait ChunkStore {
    /// Stores `chunks` (indices `0..n`, all tagged `track_id`) as a track,
    /// replacing any track with the same id.
    fn put_track(
        &mut self,
        track_id: &str,
        chunks: Vec<AudioChunk>,
        chunk_duration_secs: f64,
    ) -> Result<TrackManifest>;

    /// Opens a source starting `offset_secs` into the track. Offsets past the
    /// end yield an empty source.
    fn open(&self, track_id: &str, offset_secs: f64) -> Result<Box<dyn ChunkSource>>;

    /// All stored tracks, ordered by id.
    fn tracks(&self) -> Result<Vec<TrackManifest>>;

    /// The manifest of one track.
    fn manifest(&self, track_id: &str) -> Result<TrackManifest>;
}

fn validate_track_id(track_id: &str) -> Result<()> {
    let bad = track_id.is_empty()
        || track_id == "."
        || track_id == ".."
        || track_id.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::InvalidTrack(format!(
            "'{track_id}' is not a valid track id"
        )));
    }
    Ok(())
}

/// In-memory store keyed by `(track_id, chunk_index)`.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    manifests: BTreeMap<String, TrackManifest>,
    chunks: BTreeMap<(String, u32), AudioChunk>,
}

impl MemoryChunkStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn put_track(
        &mut self,
        track_id: &str,
        chunks: Vec<AudioChunk>,
        chunk_duration_secs: f64,
    ) -> Result<TrackManifest> {
        let manifest = TrackManifest::describe(track_id, &chunks, chunk_duration_secs)?;
        self.chunks.retain(|(track, _), _| track != track_id);
        for c in chunks {
            self.chunks
                .insert((track_id.to_string(), c.chunk_index()), c);
        }
        self.manifests
            .insert(track_id.to_string(), manifest.clone());
        Ok(manifest)
    }

    fn open(&self, track_id: &str, offset_secs: f64) -> Result<Box<dyn ChunkSource>> {
        let manifest = self.manifest(track_id)?;
        let position = chunk::locate(offset_secs, manifest.chunk_duration_secs)?;
        let chunks = (position.chunk_index..manifest.chunk_count)
            .filter_map(|i| self.chunks.get(&(track_id.to_string(), i)).cloned())
            .collect::<Vec<_>>();
        Ok(Box::new(TrimFirst::new(
            MemorySource::new(chunks),
            position.within_secs,
        )))
    }

    fn tracks(&self) -> Result<Vec<TrackManifest>> {
        Ok(self.manifests.values().cloned().collect())
    }

    fn manifest(&self, track_id: &str) -> Result<TrackManifest> {
        self.manifests
            .get(track_id)
            .cloned()
            .ok_or_else(|| Error::TrackNotFound(track_id.to_string()))
    }
}

/// Store that keeps one directory per track under a root directory.
#[derive(Debug, Clone)]
pub struct DirChunkStore {
    root: PathBuf,
}

impl DirChunkStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open_root<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "opened chunk store");
        Ok(Self { root })
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn track_dir(&self, track_id: &str) -> Result<PathBuf> {
        validate_track_id(track_id)?;
        Ok(self.root.join(track_id))
    }
}

fn chunk_path(track_dir: &Path, index: u32) -> PathBuf {
    track_dir.join(format!("chunk-{index:06}.wav"))
}

fn read_manifest(path: &Path) -> Result<TrackManifest> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Manifest(format!("{}: {e}", path.display())))
}

impl ChunkStore for DirChunkStore {
    fn put_track(
        &mut self,
        track_id: &str,
        chunks: Vec<AudioChunk>,
        chunk_duration_secs: f64,
    ) -> Result<TrackManifest> {
        let manifest = TrackManifest::describe(track_id, &chunks, chunk_duration_secs)?;
        let dir = self.track_dir(track_id)?;
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        for c in &chunks {
            write_wav_buffer(chunk_path(&dir, c.chunk_index()), &chunk::decode(c), 32)?;
        }
        let content =
            toml::to_string_pretty(&manifest).map_err(|e| Error::Manifest(e.to_string()))?;
        fs::write(dir.join(MANIFEST_FILE), content)?;

        tracing::info!(
            track = track_id,
            chunks = manifest.chunk_count,
            dir = %dir.display(),
            "stored track"
        );
        Ok(manifest)
    }

    fn open(&self, track_id: &str, offset_secs: f64) -> Result<Box<dyn ChunkSource>> {
        let manifest = self.manifest(track_id)?;
        let position = chunk::locate(offset_secs, manifest.chunk_duration_secs)?;
        tracing::debug!(
            track = track_id,
            chunk = position.chunk_index,
            trim_secs = position.within_secs,
            "opening track"
        );
        let source = DirChunkSource {
            dir: self.track_dir(track_id)?,
            track_id: track_id.to_string(),
            next_index: position.chunk_index,
            chunk_count: manifest.chunk_count,
        };
        Ok(Box::new(TrimFirst::new(source, position.within_secs)))
    }

    fn tracks(&self) -> Result<Vec<TrackManifest>> {
        let mut tracks = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let manifest_path = entry?.path().join(MANIFEST_FILE);
            if manifest_path.is_file() {
                tracks.push(read_manifest(&manifest_path)?);
            }
        }
        tracks.sort_by(|a, b| a.track_id.cmp(&b.track_id));
        Ok(tracks)
    }

    fn manifest(&self, track_id: &str) -> Result<TrackManifest> {
        let path = self.track_dir(track_id)?.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(Error::TrackNotFound(track_id.to_string()));
        }
        read_manifest(&path)
    }
}

/// Lazily reads a track's chunk files in order.
#[derive(Debug)]
pub struct DirChunkSource {
    dir: PathBuf,
    track_id: String,
    next_index: u32,
    chunk_count: u32,
}

impl ChunkSource for DirChunkSource {
    fn next_chunk(&mut self) -> Result<Option<AudioChunk>> {
        if self.next_index >= self.chunk_count {
            return Ok(None);
        }
        let path = chunk_path(&self.dir, self.next_index);
        let buffer = read_wav_buffer(&path)
            .map_err(|e| Error::Source(format!("{}: {e}", path.display())))?;
        let sample_rate = buffer.sample_rate();
        let chunk = AudioChunk::new(
            self.track_id.clone(),
            self.next_index,
            buffer.into_channels(),
            sample_rate,
        )?;
        self.next_index += 1;
        Ok(Some(chunk))
    }

    fn cancel(&mut self) -> Result<()> {
        self.next_index = self.chunk_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, seconds: usize, sample_rate: u32) -> Vec<AudioChunk> {
        let frames = seconds * sample_rate as usize;
        let samples: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        let buffer = segue_core::AudioBuffer::new(vec![samples], sample_rate).unwrap();
        chunk::encode(&buffer, id, 10.0).unwrap()
    }

    fn drain(mut source: Box<dyn ChunkSource>) -> Vec<AudioChunk> {
        std::iter::from_fn(|| source.next_chunk().unwrap()).collect()
    }

    #[test]
    fn memory_store_opens_at_offset() {
        let mut store = MemoryChunkStore::new();
        let manifest = store.put_track("t", track("t", 30, 100), 10.0).unwrap();
        assert_eq!(manifest.chunk_count, 3);
        assert_eq!(manifest.frame_count, 3000);
        assert_eq!(manifest.duration_secs(), 30.0);

        let chunks = drain(store.open("t", 15.0).unwrap());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index(), 1);
        assert_eq!(chunks[0].frame_count(), 500);
        assert_eq!(chunks[1].frame_count(), 1000);
    }

    #[test]
    fn offset_past_end_is_empty() {
        let mut store = MemoryChunkStore::new();
        store.put_track("t", track("t", 20, 100), 10.0).unwrap();
        assert!(drain(store.open("t", 45.0).unwrap()).is_empty());
    }

    #[test]
    fn rejects_foreign_or_gapped_chunks() {
        let mut store = MemoryChunkStore::new();
        assert!(matches!(
            store.put_track("a", track("b", 10, 100), 10.0),
            Err(Error::InvalidTrack(_))
        ));
        let mut chunks = track("a", 30, 100);
        chunks.remove(1);
        assert!(matches!(
            store.put_track("a", chunks, 10.0),
            Err(Error::InvalidTrack(_))
        ));
        assert!(matches!(
            store.manifest("a"),
            Err(Error::TrackNotFound(_))
        ));
    }

    #[test]
    fn rejects_path_like_track_ids() {
        assert!(validate_track_id("../up").is_err());
        assert!(validate_track_id("..").is_err());
        assert!(validate_track_id("").is_err());
        assert!(validate_track_id("song-01").is_ok());
    }

    #[test]
    fn dir_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirChunkStore::open_root(dir.path().join("tracks")).unwrap();
        let original = track("song", 25, 100);
        store.put_track("song", original.clone(), 10.0).unwrap();
        store.put_track("other", track("other", 5, 100), 10.0).unwrap();

        assert!(dir.path().join("tracks/song/chunk-000002.wav").is_file());
        let ids: Vec<_> = store
            .tracks()
            .unwrap()
            .into_iter()
            .map(|m| m.track_id)
            .collect();
        assert_eq!(ids, ["other", "song"]);

        let read = drain(store.open("song", 0.0).unwrap());
        assert_eq!(read, original);
    }

    #[test]
    fn dir_source_cancel_stops_reads() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirChunkStore::open_root(dir.path()).unwrap();
        store.put_track("t", track("t", 30, 100), 10.0).unwrap();
        let mut source = store.open("t", 0.0).unwrap();
        assert!(source.next_chunk().unwrap().is_some());
        source.cancel().unwrap();
        assert!(source.next_chunk().unwrap().is_none());
    }

    #[test]
    fn missing_track_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirChunkStore::open_root(dir.path()).unwrap();
        assert!(matches!(
            store.open("nope", 0.0),
            Err(Error::TrackNotFound(id)) if id == "nope"
        ));
    }
}
