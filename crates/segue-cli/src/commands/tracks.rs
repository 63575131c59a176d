//! Track listing command.

use std::path::PathBuf;

use clap::Args;
use segue_config::Settings;
use segue_io::ChunkStore;

use super::common::open_store;

#[derive(Args)]
pub struct TracksArgs {
    /// Store directory (defaults to the configured store root)
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Print manifests as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: TracksArgs, settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(args.store, settings)?;
    let tracks = store.tracks()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tracks)?);
        return Ok(());
    }

    if tracks.is_empty() {
        println!("No tracks in {}.", store.root().display());
        return Ok(());
    }

    println!("Tracks in {}", store.root().display());
    println!();
    println!(
        "  {:<24} {:>8} {:>6} {:>8} {:>9}",
        "ID", "RATE", "CH", "CHUNKS", "DURATION"
    );
    for track in &tracks {
        println!(
            "  {:<24} {:>8} {:>6} {:>8} {:>8.1}s",
            track.track_id,
            track.sample_rate,
            track.channels,
            track.chunk_count,
            track.duration_secs()
        );
    }
    println!();
    println!("Total: {} track(s)", tracks.len());
    Ok(())
}
