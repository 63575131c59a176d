//! Integration tests: orchestrator, render context and stores together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use segue_core::{AudioBuffer, AudioChunk, Effect, OnePole, chunk, insert_node_between};
use segue_io::{
    ChunkSource, ChunkStore, DirChunkStore, Error, MemoryChunkStore, MemorySource,
    PlaybackClock, RenderContext, StreamEvent, StreamOrchestrator, StreamPhase, StreamState,
    ingest_wav, write_wav_buffer,
};

const SR: u32 = 1000;

fn ramp(frames: usize) -> Vec<f32> {
    (0..frames).map(|i| (i % 997) as f32 / 997.0).collect()
}

fn chunked(frames: usize, chunk_secs: f64) -> Vec<AudioChunk> {
    let buffer = AudioBuffer::new(vec![ramp(frames)], SR).unwrap();
    chunk::encode(&buffer, "track", chunk_secs).unwrap()
}

fn player_with(chunks: Vec<AudioChunk>) -> (Arc<RenderContext>, StreamOrchestrator) {
    let ctx = Arc::new(RenderContext::new(SR, 1));
    let mut player = StreamOrchestrator::with_clock(ctx.clone());
    player.set_reader(Box::new(MemorySource::new(chunks)));
    (ctx, player)
}

fn pump(player: &mut StreamOrchestrator) -> StreamState {
    player.poll_until_blocked().unwrap()
}

/// Renders in `block`-frame steps until the stream is over and silent.
fn play_to_end(ctx: &RenderContext, player: &mut StreamOrchestrator, block: usize) -> Vec<f32> {
    let mut out = Vec::new();
    loop {
        let state = pump(player);
        if state.is_terminal() && !player.is_playing() {
            return out;
        }
        out.extend(ctx.render_frames(block));
    }
}

#[test]
fn start_times_are_additive_despite_read_latency() {
    let (ctx, mut player) = player_with(chunked(5 * 250, 0.25));
    let starts = Arc::new(Mutex::new(Vec::new()));
    let log = starts.clone();
    player.subscribe(move |event| {
        if let StreamEvent::SegmentStarted(segment) = event {
            log.lock().unwrap().push(segment.start_time());
        }
    });

    ctx.render_frames(37);
    player.stream(0.0);
    let first = ctx.now();
    // Uneven render bursts between polls stand in for slow reads.
    for burst in [3, 190, 41, 260, 7, 300, 120] {
        pump(&mut player);
        ctx.render_frames(burst);
    }
    while !pump(&mut player).is_terminal() {
        ctx.render_frames(50);
    }

    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 5);
    for (i, start) in starts.iter().enumerate() {
        assert!(
            (start - (first + i as f64 * 0.25)).abs() < 1e-9,
            "segment {i} starts at {start}"
        );
    }
}

#[test]
fn playback_is_gapless_across_chunk_boundaries() {
    let frames = 3 * 400 + 123;
    let (ctx, mut player) = player_with(chunked(frames, 0.4));
    player.stream(0.0);

    let out = play_to_end(&ctx, &mut player, 64);
    assert!(out.len() >= frames);
    assert_eq!(&out[..frames], &ramp(frames)[..]);
    assert!(out[frames..].iter().all(|&s| s == 0.0));
    assert_eq!(player.state(), StreamState::Ended);
}

#[test]
fn resampled_playback_joins_without_overlap() {
    for (track_rate, output_rate) in [(44100, 48000), (48000, 44100), (22050, 48000)] {
        let ctx = Arc::new(RenderContext::new(output_rate, 1));
        let mut player = StreamOrchestrator::with_clock(ctx.clone());
        let window = track_rate as usize / 10;
        let chunks: Vec<AudioChunk> = (0..4)
            .map(|i| AudioChunk::new("track", i, vec![vec![1.0; window]], track_rate).unwrap())
            .collect();
        player.set_reader(Box::new(MemorySource::new(chunks)));
        player.stream(0.0);

        let out = play_to_end(&ctx, &mut player, 512);
        let expected = 4 * output_rate as usize / 10;
        assert!(
            out[..expected].iter().all(|&s| s == 1.0),
            "{track_rate} -> {output_rate}: gap or overlap inside the track"
        );
        assert!(
            out[expected..].iter().all(|&s| s == 0.0),
            "{track_rate} -> {output_rate}: track runs past {expected} frames"
        );
    }
}

#[test]
fn start_delay_offsets_first_segment() {
    let (ctx, mut player) = player_with(chunked(100, 0.1));
    player.stream(0.05);
    let out = play_to_end(&ctx, &mut player, 32);
    assert!(out[..50].iter().all(|&s| s == 0.0));
    assert_eq!(&out[50..150], &ramp(100)[..]);
}

#[test]
fn subscribe_replays_retained_segments() {
    let (_ctx, mut player) = player_with(chunked(3 * 100, 0.1));
    player.stream(0.0);
    pump(&mut player);
    assert_eq!(player.current_graphs().count(), 2);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    player.subscribe(move |event| {
        if let StreamEvent::SegmentStarted(segment) = event {
            log.lock().unwrap().push(segment.chunk_index());
        }
    });
    assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
}

#[test]
fn volume_updates_every_retained_gain() {
    let (ctx, mut player) = player_with(chunked(3 * 100, 0.1));
    player.stream(0.0);
    pump(&mut player);

    player.set_volume(0.5);
    assert_eq!(player.volume(), 0.5);
    for segment in player.segments() {
        let gain = segment.graph().unit(segment.gain_node()).unwrap();
        assert_eq!(ctx.gain(gain), Some(0.5));
    }

    let out = ctx.render_frames(10);
    for (a, b) in out.iter().zip(ramp(10)) {
        assert_eq!(*a, b * 0.5);
    }
}

#[test]
fn stop_mid_second_chunk_halts_and_cancels() {
    let (ctx, mut player) = player_with(chunked(3 * 100, 0.1));
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    player.subscribe(move |event| {
        log.lock().unwrap().push(match event {
            StreamEvent::SegmentStarted(s) => format!("started {}", s.chunk_index()),
            StreamEvent::Ended => "ended".to_string(),
            StreamEvent::Cancelled => "cancelled".to_string(),
        });
    });

    player.stream(0.0);
    assert_eq!(
        pump(&mut player),
        StreamState::Streaming(StreamPhase::AwaitingSegmentEnd)
    );
    // Into the second chunk without polling.
    ctx.render_frames(150);
    let second = player.segments().nth(1).unwrap();
    let second_source = second.graph().unit(second.source_node()).unwrap();
    assert!(!ctx.has_ended(second_source));

    player.stop().unwrap();
    assert!(ctx.has_ended(second_source));
    assert_eq!(ctx.active_sources(), 0);
    assert!(ctx.render_frames(20).iter().all(|&s| s == 0.0));

    assert_eq!(player.poll().unwrap(), StreamState::Cancelled);
    assert_eq!(pump(&mut player), StreamState::Cancelled);
    let indices: Vec<u32> = player.segments().map(|s| s.chunk_index()).collect();
    assert_eq!(indices, vec![0, 1]);
    assert_eq!(
        *events.lock().unwrap(),
        vec!["started 0", "started 1", "cancelled"]
    );

    // Idempotent, publishes nothing further.
    player.stop().unwrap();
    assert_eq!(events.lock().unwrap().len(), 3);
}

#[test]
fn subscriber_can_splice_effects_into_live_segments() {
    let (ctx, mut player) = player_with(chunked(2 * 200, 0.2));
    let fx_ctx = ctx.clone();
    player.subscribe(move |event| {
        if let StreamEvent::SegmentStarted(segment) = event {
            let unit = fx_ctx.create_effect(|| Box::new(OnePole::new(SR as f32, 20.0)));
            let (source, gain) = (segment.source_node(), segment.gain_node());
            let graph = segment.graph_mut();
            let node = graph.add_node(unit);
            insert_node_between(graph, node, source, gain).unwrap();
        }
    });
    player.stream(0.0);
    let out = play_to_end(&ctx, &mut player, 50);

    let mut reference = OnePole::new(SR as f32, 20.0);
    let dry = ramp(200);
    for (i, &x) in dry.iter().enumerate() {
        assert!((out[i] - reference.process(x)).abs() < 1e-6);
    }
}

#[test]
fn dropped_graphs_are_freed_after_playback() {
    let (ctx, mut player) = player_with(chunked(4 * 100, 0.1));
    player.stream(0.0);
    play_to_end(&ctx, &mut player, 40);

    // Two retained segments, two units each, plus the destination.
    assert_eq!(ctx.unit_count(), 5);
    drop(player);
    assert_eq!(ctx.unit_count(), 1);
}

struct Flaky {
    inner: MemorySource,
    fail_on: usize,
    pulls: usize,
}

impl ChunkSource for Flaky {
    fn next_chunk(&mut self) -> segue_io::Result<Option<AudioChunk>> {
        self.pulls += 1;
        if self.pulls == self.fail_on {
            return Err(Error::Source("disk hiccup".into()));
        }
        self.inner.next_chunk()
    }

    fn cancel(&mut self) -> segue_io::Result<()> {
        self.inner.cancel()
    }
}

#[test]
fn source_errors_propagate_and_poll_can_retry() {
    let ctx = Arc::new(RenderContext::new(SR, 1));
    let mut player = StreamOrchestrator::with_clock(ctx.clone());
    player.set_reader(Box::new(Flaky {
        inner: MemorySource::new(chunked(2 * 100, 0.1)),
        fail_on: 2,
        pulls: 0,
    }));
    player.stream(0.0);
    player.poll().unwrap();

    let before = player.state();
    assert!(matches!(player.poll(), Err(Error::Source(_))));
    assert_eq!(player.state(), before);

    assert_eq!(
        player.poll().unwrap(),
        StreamState::Streaming(StreamPhase::AwaitingSegmentEnd)
    );
    assert_eq!(player.segments().count(), 2);
}

#[test]
fn run_drives_stream_to_end_while_audio_thread_renders() {
    let (ctx, mut player) = player_with(chunked(5 * 100, 0.1));
    let done = Arc::new(AtomicBool::new(false));
    let renderer = {
        let (ctx, done) = (ctx.clone(), done.clone());
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                ctx.render_frames(16);
                thread::yield_now();
            }
        })
    };

    player.stream(0.0);
    let state = player.run(&AtomicBool::new(false)).unwrap();
    done.store(true, Ordering::Relaxed);
    renderer.join().unwrap();
    assert_eq!(state, StreamState::Ended);
}

#[test]
fn run_stops_on_interrupt() {
    let (_ctx, mut player) = player_with(chunked(5 * 100, 0.1));
    player.stream(0.0);
    let state = player.run(&AtomicBool::new(true)).unwrap();
    assert_eq!(state, StreamState::Cancelled);
    assert!(!player.is_playing());
}

#[test]
fn memory_store_resumes_mid_track() {
    let mut store = MemoryChunkStore::new();
    let samples = ramp(2500);
    let buffer = AudioBuffer::new(vec![samples.clone()], SR).unwrap();
    store
        .put_track("track", chunk::encode(&buffer, "track", 1.0).unwrap(), 1.0)
        .unwrap();

    let ctx = Arc::new(RenderContext::new(SR, 1));
    let mut player = StreamOrchestrator::with_clock(ctx.clone());
    player.set_reader(store.open("track", 1.5).unwrap());
    player.stream(0.0);
    let out = play_to_end(&ctx, &mut player, 100);
    assert_eq!(&out[..1000], &samples[1500..]);
}

#[test]
fn wav_ingest_through_dir_store_plays_back() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("input.wav");
    let left = ramp(1800);
    let right: Vec<f32> = left.iter().map(|s| -s).collect();
    let buffer = AudioBuffer::new(vec![left.clone(), right.clone()], SR).unwrap();
    write_wav_buffer(&wav, &buffer, 32).unwrap();

    let mut store = DirChunkStore::open_root(dir.path().join("store")).unwrap();
    let manifest = ingest_wav(&wav, &mut store, "song", 0.5).unwrap();
    assert_eq!(manifest.chunk_count, 4);
    assert_eq!(manifest.channels, 2);
    assert_eq!(manifest.frame_count, 1800);

    let ctx = Arc::new(RenderContext::new(SR, 2));
    let mut player = StreamOrchestrator::with_clock(ctx.clone());
    player.set_reader(store.open("song", 0.25).unwrap());
    player.stream(0.0);

    let mut out = Vec::new();
    loop {
        let state = pump(&mut player);
        if state.is_terminal() && !player.is_playing() {
            break;
        }
        out.extend(ctx.render_frames(64));
    }
    let played = AudioBuffer::from_interleaved(&out, 2, SR).unwrap();
    assert_eq!(&played.channel(0).unwrap()[..1550], &left[250..]);
    assert_eq!(&played.channel(1).unwrap()[..1550], &right[250..]);
}
