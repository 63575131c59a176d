//! Live playback of a stored track.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Args;
use segue_config::Settings;
use segue_io::StreamState;
use segue_io::backend::{AudioBackend, BackendStreamConfig};
use segue_io::cpal_backend::CpalBackend;

use super::common::{PlayerOptions, open_store, parse_seconds, parse_volume, prepare_player};

#[derive(Args)]
pub struct PlayArgs {
    /// Track id to play
    #[arg(value_name = "TRACK")]
    track: String,

    /// Start position in seconds
    #[arg(long, default_value_t = 0.0, value_parser = parse_seconds)]
    offset: f64,

    /// Volume factor (defaults to the configured volume)
    #[arg(long, value_parser = parse_volume)]
    volume: Option<f32>,

    /// Delay before the first chunk, in seconds
    #[arg(long, value_parser = parse_seconds)]
    delay: Option<f64>,

    /// Insert a one-pole lowpass at this cutoff (Hz) into every segment
    #[arg(long, value_name = "HZ")]
    lowpass: Option<f32>,

    /// Output device (partial name)
    #[arg(short, long)]
    output: Option<String>,

    /// Store directory (defaults to the configured store root)
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,
}

pub fn run(args: PlayArgs, settings: &Settings) -> anyhow::Result<()> {
    let playback = &settings.playback;
    let store = open_store(args.store, settings)?;
    let options = PlayerOptions {
        offset_secs: args.offset,
        volume: args.volume.unwrap_or(playback.volume),
        lowpass_hz: args.lowpass,
        sample_rate: playback.sample_rate,
        channels: playback.channels as usize,
    };
    let (ctx, mut player, manifest) = prepare_player(&store, &args.track, &options)?;

    println!(
        "Playing '{}' ({:.1}s, {} chunk(s)) from {:.1}s",
        manifest.track_id,
        manifest.duration_secs(),
        manifest.chunk_count,
        args.offset
    );

    let backend = CpalBackend::new();
    let config = BackendStreamConfig {
        sample_rate: playback.sample_rate,
        buffer_size: playback.buffer_size,
        channels: playback.channels,
        device_name: args.output.or_else(|| playback.output_device.clone()),
    };
    let render_ctx = Arc::clone(&ctx);
    let _stream = backend.build_output_stream(
        &config,
        Box::new(move |data: &mut [f32]| render_ctx.render(data)),
        Box::new(|err: &str| tracing::error!("output stream error: {err}")),
    )?;

    // Set up Ctrl+C handler
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;
    println!("Press Ctrl+C to stop.\n");

    player.stream(args.delay.unwrap_or(playback.start_delay_secs));
    let mut state = player.run(&interrupted)?;

    // The source is exhausted, but the last segment may still be sounding.
    while state == StreamState::Ended && player.is_playing() {
        if interrupted.load(Ordering::Relaxed) {
            player.stop()?;
            state = StreamState::Cancelled;
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    match state {
        StreamState::Cancelled => println!("\nStopped."),
        _ => println!("Done!"),
    }
    Ok(())
}
