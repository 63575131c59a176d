//! WAV decoding, encoding and track ingestion.
//!
//! Buffers are read planar with every channel preserved. Integer PCM is
//! scaled by `1 << (bits - 1)` into `[-1.0, 1.0)`; float files pass through.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavWriter};
use segue_core::{AudioBuffer, chunk};

use crate::Result;
use crate::store::{ChunkStore, TrackManifest};

/// WAV sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavFormat {
    /// Integer PCM.
    Pcm,
    /// 32-bit IEEE float.
    IeeeFloat,
}

/// WAV header summary, read without decoding samples.
#[derive(Debug, Clone)]
pub struct WavInfo {
    /// Number of channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample.
    pub bits_per_sample: u16,
    /// Samples per channel.
    pub num_frames: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Sample encoding.
    pub format: WavFormat,
}

/// Reads the header of a WAV file.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let num_frames = reader.duration() as u64;

    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        num_frames,
        duration_secs: num_frames as f64 / spec.sample_rate as f64,
        format: match spec.sample_format {
            SampleFormat::Float => WavFormat::IeeeFloat,
            SampleFormat::Int => WavFormat::Pcm,
        },
    })
}

/// Decodes a WAV file into a planar buffer, keeping every channel.
pub fn read_wav_buffer<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(AudioBuffer::from_interleaved(
        &interleaved,
        spec.channels as usize,
        spec.sample_rate,
    )?)
}

/// Writes `buffer` as a WAV file. 32 bits writes IEEE float, anything else
/// integer PCM at that depth.
pub fn write_wav_buffer<P: AsRef<Path>>(
    path: P,
    buffer: &AudioBuffer,
    bits_per_sample: u16,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channel_count() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample,
        sample_format: if bits_per_sample == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };
    let mut writer = WavWriter::create(path, spec)?;

    let interleaved = buffer.to_interleaved();
    if bits_per_sample == 32 {
        for sample in interleaved {
            writer.write_sample(sample)?;
        }
    } else {
        let max_val = (1i64 << (bits_per_sample - 1)) as f32;
        for sample in interleaved {
            let int_sample = (sample * max_val).clamp(-max_val, max_val - 1.0) as i32;
            writer.write_sample(int_sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Decodes `path`, slices it into `chunk_duration_secs` chunks and stores
/// them as `track_id`.
pub fn ingest_wav<P: AsRef<Path>>(
    path: P,
    store: &mut dyn ChunkStore,
    track_id: &str,
    chunk_duration_secs: f64,
) -> Result<TrackManifest> {
    let path = path.as_ref();
    let buffer = read_wav_buffer(path)?;
    let chunks = chunk::encode(&buffer, track_id, chunk_duration_secs)?;
    tracing::info!(
        path = %path.display(),
        track = track_id,
        chunks = chunks.len(),
        duration_secs = buffer.duration_secs(),
        "ingesting track"
    );
    store.put_track(track_id, chunks, chunk_duration_secs)
}
