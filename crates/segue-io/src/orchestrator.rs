//! Gapless chunk streaming over a playback clock.
//!
//! [`StreamOrchestrator`] pulls chunks from its [`ChunkSource`], turns each
//! into a *segment* (buffer source → gain → destination, wrapped in a
//! [`Graph`]) and schedules it to start exactly where the previous one ends.
//! Start times are purely additive (`start[i+1] = start[i] + frames[i] /
//! sample_rate`), so read latency never opens a gap as long as the next chunk
//! arrives before the current one finishes.
//!
//! ## State machine
//!
//! ```text
//!  Unbound ──set_reader──▶ Bound ──stream──▶ Streaming(AwaitingChunk)
//!                                               │  ▲
//!                                   schedule ≥2 │  │ oldest segment ended
//!                                               ▼  │
//!                                   Streaming(AwaitingSegmentEnd)
//!
//!  Streaming(p) ⇄ Paused(p)          (pause / resume)
//!  source exhausted ──▶ Ended        stop() + poll ──▶ Cancelled
//! ```
//!
//! Each [`poll`](StreamOrchestrator::poll) performs at most one transition
//! and never blocks; [`run`](StreamOrchestrator::run) loops `poll` and
//! blocks on the clock between segment ends.
//!
//! ## Retention
//!
//! At most [`MAX_RETAINED_SEGMENTS`] segments are kept: the one playing and
//! the one queued behind it. Scheduling a third drops the oldest segment's
//! graph; the clock frees its units once its source has finished, so it is
//! never cut short.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use segue_core::{AudioChunk, Graph, NodeId, Patchbay, UnitId, chunk, insert_node_between};

use crate::Result;
use crate::clock::PlaybackClock;
use crate::context::RenderContext;
use crate::source::ChunkSource;

/// Number of segments kept alive: the playing one and the next.
pub const MAX_RETAINED_SEGMENTS: usize = 2;

/// How long [`StreamOrchestrator::run`] blocks before rechecking the
/// interrupt flag.
const WAIT_SLICE: Duration = Duration::from_millis(20);

/// Where a streaming orchestrator is in its read/schedule loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Next `poll` pulls a chunk and schedules it.
    AwaitingChunk,
    /// Next `poll` checks whether the oldest retained segment has ended.
    AwaitingSegmentEnd,
}

/// Lifecycle of a [`StreamOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No chunk source yet.
    Unbound,
    /// Source bound, streaming not started.
    Bound,
    /// Reading and scheduling chunks.
    Streaming(StreamPhase),
    /// Clock suspended; polling makes no progress until resumed.
    Paused(StreamPhase),
    /// The source ran out of chunks.
    Ended,
    /// Streaming was stopped.
    Cancelled,
}

impl StreamState {
    /// Returns `true` for `Ended` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }
}

/// Handle returned by [`StreamOrchestrator::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Notification delivered to subscribers.
#[derive(Debug)]
pub enum StreamEvent<'a> {
    /// A segment was scheduled. Subscribers may splice stages into its graph.
    SegmentStarted(&'a mut Segment),
    /// The source is exhausted; the last segment may still be playing.
    Ended,
    /// Streaming was stopped.
    Cancelled,
}

type Subscriber = Box<dyn FnMut(StreamEvent<'_>) + Send>;

/// One scheduled chunk and the graph that plays it.
#[derive(Debug)]
pub struct Segment {
    chunk_index: u32,
    start_time: f64,
    duration: f64,
    graph: Graph,
    gain: NodeId,
}

impl Segment {
    /// Index of the chunk this segment plays.
    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    /// Scheduled start on the clock timeline, in seconds.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// `start_time + duration`.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// The segment's processing graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access for splicing stages into the live path.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Node wrapping the buffer source (the graph's input).
    pub fn source_node(&self) -> NodeId {
        self.graph.input()
    }

    /// Node wrapping the volume stage.
    pub fn gain_node(&self) -> NodeId {
        self.gain
    }

    fn source_unit(&self) -> Option<UnitId> {
        self.graph.unit(self.graph.input())
    }

    fn gain_unit(&self) -> Option<UnitId> {
        self.graph.unit(self.gain)
    }
}

/// Streams one chunk source through a playback clock.
///
/// See the [module docs](self) for the state machine.
///
/// # Panics
///
/// Binding a second reader, controlling playback before a reader is bound
/// and unsubscribing an unknown id are programmer errors and panic.
pub struct StreamOrchestrator<C: PlaybackClock = RenderContext> {
    clock: Arc<C>,
    reader: Option<Box<dyn ChunkSource>>,
    state: StreamState,
    cancelled: bool,
    start_delay: f64,
    next_start: Option<f64>,
    volume: f32,
    segments: VecDeque<Segment>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    scheduled: u64,
}

impl StreamOrchestrator<RenderContext> {
    /// Creates an orchestrator on a fresh default [`RenderContext`].
    pub fn new() -> Self {
        Self::with_clock(Arc::new(RenderContext::default()))
    }
}

impl Default for StreamOrchestrator<RenderContext> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PlaybackClock> StreamOrchestrator<C> {
    /// Creates an orchestrator scheduling on `clock`.
    pub fn with_clock(clock: Arc<C>) -> Self {
        Self {
            clock,
            reader: None,
            state: StreamState::Unbound,
            cancelled: false,
            start_delay: 0.0,
            next_start: None,
            volume: 1.0,
            segments: VecDeque::with_capacity(MAX_RETAINED_SEGMENTS + 1),
            subscribers: Vec::new(),
            next_subscription: 0,
            scheduled: 0,
        }
    }

    /// The clock segments are scheduled on.
    pub fn clock(&self) -> &Arc<C> {
        &self.clock
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Binds the chunk source. Panics if one is already bound.
    pub fn set_reader(&mut self, reader: Box<dyn ChunkSource>) {
        assert!(
            self.reader.is_none(),
            "set_reader() called twice: a chunk source is already bound"
        );
        self.reader = Some(reader);
        self.state = StreamState::Bound;
    }

    /// Arms streaming: the first chunk will start `start_delay` seconds after
    /// the clock time at which it is scheduled. Drive it with
    /// [`poll`](Self::poll) or [`run`](Self::run).
    pub fn stream(&mut self, start_delay: f64) {
        match self.state {
            StreamState::Unbound => panic!("stream() called before set_reader()"),
            StreamState::Bound => {
                self.start_delay = start_delay.max(0.0);
                self.state = StreamState::Streaming(StreamPhase::AwaitingChunk);
                tracing::debug!(start_delay, "streaming armed");
            }
            state => panic!("stream() called in state {state:?}"),
        }
    }

    /// Performs at most one state transition without blocking and returns
    /// the resulting state.
    ///
    /// Source errors propagate and leave the state untouched, so the caller
    /// may poll again to retry or call [`stop`](Self::stop).
    pub fn poll(&mut self) -> Result<StreamState> {
        match self.state {
            StreamState::Unbound => panic!("poll() called before set_reader()"),
            StreamState::Streaming(_) | StreamState::Paused(_) if self.cancelled => {
                self.finish(StreamState::Cancelled);
            }
            StreamState::Streaming(StreamPhase::AwaitingChunk) => self.pull_and_schedule()?,
            StreamState::Streaming(StreamPhase::AwaitingSegmentEnd) => {
                let oldest_done = self
                    .segments
                    .front()
                    .and_then(Segment::source_unit)
                    .is_none_or(|unit| self.clock.has_ended(unit));
                if oldest_done {
                    self.state = StreamState::Streaming(StreamPhase::AwaitingChunk);
                }
            }
            StreamState::Bound
            | StreamState::Paused(_)
            | StreamState::Ended
            | StreamState::Cancelled => {}
        }
        Ok(self.state)
    }

    /// Polls until a poll neither changes the state nor schedules a segment,
    /// i.e. until the orchestrator is waiting on the clock or has finished.
    pub fn poll_until_blocked(&mut self) -> Result<StreamState> {
        loop {
            let before = (self.state, self.scheduled);
            let state = self.poll()?;
            if (state, self.scheduled) == before {
                return Ok(state);
            }
        }
    }

    /// Drives [`poll`](Self::poll) until the stream ends or is cancelled,
    /// blocking on the clock while waiting for segments to finish. When
    /// `interrupt` is raised, calls [`stop`](Self::stop) and returns
    /// `Cancelled`.
    pub fn run(&mut self, interrupt: &AtomicBool) -> Result<StreamState> {
        loop {
            if interrupt.load(Ordering::Relaxed) && !self.cancelled {
                self.stop()?;
            }
            match self.poll()? {
                state @ (StreamState::Ended | StreamState::Cancelled) => return Ok(state),
                StreamState::Streaming(StreamPhase::AwaitingSegmentEnd) => {
                    if let Some(unit) = self.segments.front().and_then(Segment::source_unit) {
                        self.clock.wait_for_end(unit, WAIT_SLICE);
                    }
                }
                StreamState::Paused(_) => std::thread::sleep(WAIT_SLICE),
                StreamState::Streaming(StreamPhase::AwaitingChunk) => {}
                state @ (StreamState::Unbound | StreamState::Bound) => {
                    panic!("run() called in state {state:?}; call stream() first")
                }
            }
        }
    }

    /// Suspends the clock. Panics if no reader is bound.
    pub fn pause(&mut self) {
        self.assert_bound("pause");
        self.clock.suspend();
        if let StreamState::Streaming(phase) = self.state {
            self.state = StreamState::Paused(phase);
        }
        tracing::info!("playback paused");
    }

    /// Resumes the clock. Panics if no reader is bound.
    pub fn resume(&mut self) {
        self.assert_bound("resume");
        self.clock.resume();
        if let StreamState::Paused(phase) = self.state {
            self.state = StreamState::Streaming(phase);
        }
        tracing::info!("playback resumed");
    }

    /// Stops streaming: raises the cancellation flag, halts every retained
    /// source immediately and cancels the chunk source. The next
    /// [`poll`](Self::poll) publishes `Cancelled`.
    ///
    /// Idempotent. After the stream has ended it only halts retained
    /// sources. Panics if no reader is bound.
    pub fn stop(&mut self) -> Result<()> {
        self.assert_bound("stop");
        for unit in self.segments.iter().filter_map(Segment::source_unit) {
            self.clock.stop(unit);
        }
        if self.cancelled || self.state.is_terminal() {
            return Ok(());
        }
        self.cancelled = true;
        tracing::info!(state = ?self.state, "stopping stream");
        if self.state == StreamState::Bound {
            self.finish(StreamState::Cancelled);
        }
        if let Some(reader) = self.reader.as_mut() {
            reader.cancel()?;
        }
        Ok(())
    }

    /// Current volume factor.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Sets the volume of every retained segment and of segments scheduled
    /// from now on.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        for unit in self.segments.iter().filter_map(Segment::gain_unit) {
            self.clock.set_gain(unit, volume);
        }
    }

    /// Registers `callback` for stream events. It immediately receives
    /// `SegmentStarted` for every retained segment, oldest first.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(StreamEvent<'_>) + Send + 'static,
    {
        let mut callback: Subscriber = Box::new(callback);
        for segment in &mut self.segments {
            callback(StreamEvent::SegmentStarted(segment));
        }
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, callback));
        id
    }

    /// Removes a subscription. Panics if `id` is not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        let Some(pos) = self.subscribers.iter().position(|(s, _)| *s == id) else {
            panic!("unsubscribe() with unknown subscription {id:?}");
        };
        self.subscribers.remove(pos);
    }

    /// Graphs of the retained segments, oldest first.
    pub fn current_graphs(&self) -> impl Iterator<Item = &Graph> {
        self.segments.iter().map(Segment::graph)
    }

    /// Retained segments, oldest first.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Returns `true` while any retained segment's source is still playing
    /// or waiting to start.
    pub fn is_playing(&self) -> bool {
        self.segments
            .iter()
            .filter_map(Segment::source_unit)
            .any(|unit| !self.clock.has_ended(unit))
    }

    fn assert_bound(&self, op: &str) {
        assert!(
            self.state != StreamState::Unbound,
            "{op}() called before set_reader()"
        );
    }

    fn pull_and_schedule(&mut self) -> Result<()> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };
        match reader.next_chunk()? {
            None => self.finish(StreamState::Ended),
            Some(next) => {
                let first = self.next_start.is_none();
                let when = self
                    .next_start
                    .unwrap_or_else(|| self.clock.now() + self.start_delay);
                self.schedule(&next, when)?;
                self.state = StreamState::Streaming(if first {
                    StreamPhase::AwaitingChunk
                } else {
                    StreamPhase::AwaitingSegmentEnd
                });
            }
        }
        Ok(())
    }

    fn schedule(&mut self, next: &AudioChunk, when: f64) -> Result<()> {
        let source = self.clock.create_source(chunk::decode(next));
        let gain_unit = self.clock.create_gain(self.volume);
        let patchbay: Arc<dyn Patchbay> = self.clock.clone();
        let mut graph = Graph::new(patchbay, source, self.clock.destination());
        let gain = graph.add_node(gain_unit);
        let (input, output) = (graph.input(), graph.output());
        insert_node_between(&mut graph, gain, input, output)?;
        self.clock.start(source, when);

        let duration = next.duration_secs();
        self.next_start = Some(when + duration);
        self.scheduled += 1;
        if self.segments.len() == MAX_RETAINED_SEGMENTS {
            if let Some(evicted) = self.segments.pop_front() {
                tracing::debug!(chunk = evicted.chunk_index, "evicting segment");
            }
        }
        tracing::debug!(
            chunk = next.chunk_index(),
            start = when,
            duration,
            "scheduled segment"
        );
        self.segments.push_back(Segment {
            chunk_index: next.chunk_index(),
            start_time: when,
            duration,
            graph,
            gain,
        });

        if let Some(segment) = self.segments.back_mut() {
            for (_, callback) in &mut self.subscribers {
                callback(StreamEvent::SegmentStarted(&mut *segment));
            }
        }
        Ok(())
    }

    fn finish(&mut self, state: StreamState) {
        self.state = state;
        tracing::info!(?state, "stream finished");
        for (_, callback) in &mut self.subscribers {
            callback(match state {
                StreamState::Cancelled => StreamEvent::Cancelled,
                _ => StreamEvent::Ended,
            });
        }
    }
}

impl<C: PlaybackClock> std::fmt::Debug for StreamOrchestrator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOrchestrator")
            .field("state", &self.state)
            .field("volume", &self.volume)
            .field("segments", &self.segments.len())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}
