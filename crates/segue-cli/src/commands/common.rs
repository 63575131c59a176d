//! Shared CLI helpers used across multiple commands.

use std::path::PathBuf;
use std::sync::Arc;

use segue_config::Settings;
use segue_core::{OnePole, insert_node_between};
use segue_io::{
    ChunkStore, DirChunkStore, PlaybackClock, RenderContext, StreamEvent, StreamOrchestrator,
    TrackManifest,
};

/// Parse a finite, non-negative number of seconds for clap's `value_parser`.
pub fn parse_seconds(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("Invalid duration: '{s}' (expected seconds)"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("Invalid duration: '{s}' (must be >= 0)"));
    }
    Ok(value)
}

/// Parse a finite, non-negative gain factor for clap's `value_parser`.
pub fn parse_volume(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("Invalid volume: '{s}' (expected a number)"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("Invalid volume: '{s}' (must be >= 0)"));
    }
    Ok(value)
}

/// Open the chunk store at `root`, or at the configured store root.
pub fn open_store(root: Option<PathBuf>, settings: &Settings) -> anyhow::Result<DirChunkStore> {
    let root = root.unwrap_or_else(|| settings.store.root.clone());
    Ok(DirChunkStore::open_root(root)?)
}

/// How a track should be streamed.
pub struct PlayerOptions {
    pub offset_secs: f64,
    pub volume: f32,
    pub lowpass_hz: Option<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Build a render context and an orchestrator bound to `track_id`.
pub fn prepare_player(
    store: &DirChunkStore,
    track_id: &str,
    options: &PlayerOptions,
) -> anyhow::Result<(Arc<RenderContext>, StreamOrchestrator, TrackManifest)> {
    let manifest = store.manifest(track_id)?;
    let ctx = Arc::new(RenderContext::new(options.sample_rate, options.channels));
    let mut player = StreamOrchestrator::with_clock(Arc::clone(&ctx));
    player.set_volume(options.volume);
    if let Some(cutoff) = options.lowpass_hz {
        splice_lowpass(&mut player, cutoff)?;
    }
    player.set_reader(store.open(track_id, options.offset_secs)?);
    Ok((ctx, player, manifest))
}

/// Insert a one-pole lowpass between source and gain of every segment.
pub fn splice_lowpass(player: &mut StreamOrchestrator, cutoff_hz: f32) -> anyhow::Result<()> {
    let ctx = Arc::clone(player.clock());
    let nyquist = ctx.sample_rate() as f32 / 2.0;
    anyhow::ensure!(
        cutoff_hz > 0.0 && cutoff_hz < nyquist,
        "Lowpass cutoff {cutoff_hz} Hz must lie between 0 and {nyquist} Hz"
    );

    player.subscribe(move |event| {
        let StreamEvent::SegmentStarted(segment) = event else {
            return;
        };
        let sample_rate = ctx.sample_rate() as f32;
        let unit = ctx.create_effect(|| Box::new(OnePole::new(sample_rate, cutoff_hz)));
        let (source, gain) = (segment.source_node(), segment.gain_node());
        let graph = segment.graph_mut();
        let node = graph.add_node(unit);
        // Every segment is wired source → gain when it is published.
        if let Err(err) = insert_node_between(graph, node, source, gain) {
            panic!("segment {} lost its source → gain edge: {err}", segment.chunk_index());
        }
    });
    Ok(())
}
