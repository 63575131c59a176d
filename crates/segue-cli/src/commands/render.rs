//! Offline rendering of a stored track into a WAV file.

use std::path::PathBuf;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use segue_config::Settings;
use segue_core::{AudioBuffer, chunk};
use segue_io::{ChunkStore, write_wav_buffer};

use super::common::{PlayerOptions, open_store, parse_seconds, parse_volume, prepare_player};

#[derive(Args)]
pub struct RenderArgs {
    /// Track id to render
    #[arg(value_name = "TRACK")]
    track: String,

    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Start position in seconds
    #[arg(long, default_value_t = 0.0, value_parser = parse_seconds)]
    offset: f64,

    /// Volume factor (defaults to the configured volume)
    #[arg(long, value_parser = parse_volume)]
    volume: Option<f32>,

    /// Insert a one-pole lowpass at this cutoff (Hz) into every segment
    #[arg(long, value_name = "HZ")]
    lowpass: Option<f32>,

    /// Output bit depth (16, 24 or 32 for float)
    #[arg(long, default_value_t = 32, value_parser = parse_bits)]
    bits: u16,

    /// Store directory (defaults to the configured store root)
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,
}

fn parse_bits(s: &str) -> Result<u16, String> {
    match s {
        "16" => Ok(16),
        "24" => Ok(24),
        "32" => Ok(32),
        _ => Err(format!("Unsupported bit depth: '{s}' (expected 16, 24 or 32)")),
    }
}

pub fn run(args: RenderArgs, settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(args.store, settings)?;
    let manifest = store.manifest(&args.track)?;

    // Offline rendering keeps the track's own rate and layout.
    let options = PlayerOptions {
        offset_secs: args.offset,
        volume: args.volume.unwrap_or(settings.playback.volume),
        lowpass_hz: args.lowpass,
        sample_rate: manifest.sample_rate,
        channels: manifest.channels as usize,
    };
    let (ctx, mut player, _) = prepare_player(&store, &args.track, &options)?;

    // The store starts on the chunk grid with the head trim rounded, so count
    // the frames it will actually skip.
    let start = chunk::locate(args.offset, manifest.chunk_duration_secs)?;
    let window = chunk::window_frames(manifest.sample_rate, manifest.chunk_duration_secs)? as u64;
    let trim = (start.within_secs * f64::from(manifest.sample_rate)).round() as u64;
    let skipped = (u64::from(start.chunk_index) * window + trim).min(manifest.frame_count);
    let expected_frames = (manifest.frame_count - skipped) as usize;
    let block = (settings.playback.buffer_size as usize).max(1);

    println!(
        "Rendering '{}' from {:.1}s to {}",
        manifest.track_id,
        args.offset,
        args.output.display()
    );

    let pb = ProgressBar::new(expected_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    player.stream(0.0);
    let channels = ctx.channels();
    let mut interleaved = Vec::with_capacity(expected_frames * channels);
    loop {
        let state = player.poll_until_blocked()?;
        if state.is_terminal() && !player.is_playing() {
            break;
        }
        interleaved.extend(ctx.render_frames(block));
        pb.set_position(((interleaved.len() / channels).min(expected_frames)) as u64);
    }
    pb.finish_with_message("done");

    interleaved.truncate(expected_frames * channels);
    let buffer = AudioBuffer::from_interleaved(&interleaved, channels, manifest.sample_rate)?;
    write_wav_buffer(&args.output, &buffer, args.bits)?;

    println!(
        "Wrote {} frames ({:.2}s) to {}",
        buffer.frame_count(),
        buffer.duration_secs(),
        args.output.display()
    );
    Ok(())
}
