//! WAV ingestion command.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use segue_config::Settings;
use segue_io::{ingest_wav, read_wav_info};

use super::common::{open_store, parse_seconds};

#[derive(Args)]
pub struct IngestArgs {
    /// WAV file to ingest
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Track id (defaults to the file stem)
    #[arg(short, long)]
    track: Option<String>,

    /// Chunk length in seconds (defaults to the configured value)
    #[arg(long, value_parser = parse_seconds)]
    chunk_duration: Option<f64>,

    /// Store directory (defaults to the configured store root)
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,
}

pub fn run(args: IngestArgs, settings: &Settings) -> anyhow::Result<()> {
    let track_id = match args.track {
        Some(id) => id,
        None => args
            .file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| {
                anyhow::anyhow!("Cannot derive a track id from '{}'", args.file.display())
            })?,
    };
    let chunk_duration = args.chunk_duration.unwrap_or(settings.store.chunk_duration_secs);
    anyhow::ensure!(chunk_duration > 0.0, "Chunk duration must be positive");

    let info = read_wav_info(&args.file)?;
    println!("Ingesting {} as '{}'", args.file.display(), track_id);
    println!(
        "  {} frames, {} Hz, {} channel(s), {:.1}s",
        info.num_frames, info.sample_rate, info.channels, info.duration_secs
    );

    let mut store = open_store(args.store, settings)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.set_message(format!("slicing into {chunk_duration}s chunks"));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let manifest = ingest_wav(&args.file, &mut store, &track_id, chunk_duration)?;
    spinner.finish_and_clear();

    println!(
        "Stored '{}': {} chunk(s), {:.2}s in {}",
        manifest.track_id,
        manifest.chunk_count,
        manifest.duration_secs(),
        store.root().display()
    );
    Ok(())
}
