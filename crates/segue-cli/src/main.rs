//! Segue CLI - ingest WAV files into chunked tracks and stream them gaplessly.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use segue_config::Settings;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segue")]
#[command(author, version, about = "Gapless chunked audio player", long_about = None)]
struct Cli {
    /// Settings file (defaults to the user settings file)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Slice a WAV file into chunks and add it to the store
    Ingest(commands::ingest::IngestArgs),

    /// List stored tracks
    Tracks(commands::tracks::TracksArgs),

    /// Stream a stored track to an audio device
    Play(commands::play::PlayArgs),

    /// Stream a stored track offline into a WAV file
    Render(commands::render::RenderArgs),

    /// List audio output devices
    Devices(commands::devices::DevicesArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_or_default()?,
    };

    match cli.command {
        Commands::Ingest(args) => commands::ingest::run(args, &settings),
        Commands::Tracks(args) => commands::tracks::run(args, &settings),
        Commands::Play(args) => commands::play::run(args, &settings),
        Commands::Render(args) => commands::render::run(args, &settings),
        Commands::Devices(args) => commands::devices::run(args),
    }
}
