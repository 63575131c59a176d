//! Software playback clock.
//!
//! [`RenderContext`] keeps an arena of units and the unit-level edges between
//! them behind one `parking_lot::Mutex`. Whoever owns the output drives it by
//! calling [`render`](RenderContext::render): the cpal callback during live
//! playback, or a plain loop for offline rendering and tests.
//!
//! ## Block processing
//!
//! ```text
//!  1. every started source renders (connected or not, so it can end)
//!  2. units reachable from the destination run once each, inputs first
//!       gain:        sum(inputs) * value
//!       effect:      sum(inputs) through one Effect per channel
//!       destination: sum(inputs) -> output block
//!  3. time advances by the block length; released groups are collected
//! ```
//!
//! Sources start on the exact frame `round(when * sample_rate)` and stop on
//! `round((when + duration) * sample_rate)`, so two segments scheduled
//! back-to-back join without a gap or an overlap, whatever their rates. A source whose sample
//! rate differs from the context's is read with linear interpolation. Mono
//! buffers feed every output channel; buffer channels beyond the output
//! count are dropped.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use segue_core::{AudioBuffer, Effect, Patchbay, UnitId};

use crate::clock::PlaybackClock;

const DESTINATION: UnitId = UnitId::from_raw(0);

/// Software [`PlaybackClock`] rendered in caller-sized blocks.
///
/// Share it through an `Arc`: the orchestrator schedules on it while the
/// audio thread renders from it.
pub struct RenderContext {
    state: Mutex<ContextState>,
    ended: Condvar,
}

struct ContextState {
    sample_rate: u32,
    channels: usize,
    frames_rendered: u64,
    suspended: bool,
    units: Vec<Option<Unit>>,
    /// Slots of live source units.
    sources: Vec<usize>,
    edges: Vec<(UnitId, UnitId)>,
    released: Vec<Vec<UnitId>>,
    // Scratch space reused by every block.
    order: Vec<UnitId>,
    visited: Vec<bool>,
}

struct Unit {
    kind: UnitKind,
    /// Interleaved output of the last processed block.
    output: Vec<f32>,
}

enum UnitKind {
    Destination,
    Gain { value: f32 },
    Source(SourceState),
    /// One instance per output channel.
    Effect(Vec<Box<dyn Effect + Send>>),
}

struct SourceState {
    buffer: AudioBuffer,
    start_frame: Option<u64>,
    /// Output frames the buffer spans once started.
    length: u64,
    /// Output frames rendered so far.
    played: u64,
    /// Buffer frames consumed per output frame.
    step: f64,
    ended: bool,
}

impl RenderContext {
    /// Creates a context producing `channels` interleaved channels at
    /// `sample_rate`.
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        let mut state = ContextState {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            frames_rendered: 0,
            suspended: false,
            units: Vec::new(),
            sources: Vec::new(),
            edges: Vec::new(),
            released: Vec::new(),
            order: Vec::new(),
            visited: Vec::new(),
        };
        state.insert(UnitKind::Destination);
        tracing::debug!(sample_rate, channels, "render context created");
        Self {
            state: Mutex::new(state),
            ended: Condvar::new(),
        }
    }

    /// Number of interleaved output channels.
    pub fn channels(&self) -> usize {
        self.state.lock().channels
    }

    /// Fills `out` (interleaved, `frames * channels` samples) with the next
    /// block and advances the clock. Outputs silence without advancing while
    /// suspended. A trailing partial frame is left silent.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let mut state = self.state.lock();
        if state.suspended {
            return;
        }
        let channels = state.channels;
        let frames = out.len() / channels;
        let block_start = state.frames_rendered;

        let mut any_ended = false;
        for i in 0..state.sources.len() {
            let idx = state.sources[i];
            any_ended |= state.process_unit(idx, block_start, frames);
        }
        let order = state.take_processing_order();
        for unit in &order {
            let idx = unit.index() as usize;
            if !state.is_source(idx) {
                state.process_unit(idx, block_start, frames);
            }
        }
        state.order = order;

        if let Some(Some(dest)) = state.units.first() {
            let len = frames * channels;
            out[..len].copy_from_slice(&dest.output[..len]);
        }
        state.frames_rendered += frames as u64;
        state.collect_released();
        drop(state);

        if any_ended {
            self.ended.notify_all();
        }
    }

    /// Renders `frames` frames into a fresh interleaved vector.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * self.channels()];
        self.render(&mut out);
        out
    }

    /// Creates an effect unit, calling `make` once per output channel.
    pub fn create_effect<F>(&self, mut make: F) -> UnitId
    where
        F: FnMut() -> Box<dyn Effect + Send>,
    {
        let mut state = self.state.lock();
        let sample_rate = state.sample_rate as f32;
        let effects = (0..state.channels)
            .map(|_| {
                let mut effect = make();
                effect.set_sample_rate(sample_rate);
                effect
            })
            .collect();
        state.insert(UnitKind::Effect(effects))
    }

    /// Returns `true` if the unit-level edge `from → to` exists.
    pub fn is_connected(&self, from: UnitId, to: UnitId) -> bool {
        self.state.lock().edges.contains(&(from, to))
    }

    /// Number of live units, including the destination.
    pub fn unit_count(&self) -> usize {
        self.state.lock().units.iter().flatten().count()
    }

    /// Number of sources that have started and not yet ended.
    pub fn active_sources(&self) -> usize {
        self.state
            .lock()
            .units
            .iter()
            .flatten()
            .filter(|u| {
                matches!(&u.kind, UnitKind::Source(s) if s.start_frame.is_some() && !s.ended)
            })
            .count()
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(48000, 2)
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RenderContext")
            .field("sample_rate", &state.sample_rate)
            .field("channels", &state.channels)
            .field("frames_rendered", &state.frames_rendered)
            .field("suspended", &state.suspended)
            .finish_non_exhaustive()
    }
}

impl ContextState {
    fn insert(&mut self, kind: UnitKind) -> UnitId {
        let idx = self.units.len();
        if matches!(kind, UnitKind::Source(_)) {
            self.sources.push(idx);
        }
        let id = UnitId::from_raw(idx as u32);
        self.units.push(Some(Unit {
            kind,
            output: Vec::new(),
        }));
        id
    }

    fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id.index() as usize)?.as_mut()
    }

    fn source_mut(&mut self, id: UnitId) -> Option<&mut SourceState> {
        match &mut self.unit_mut(id)?.kind {
            UnitKind::Source(source) => Some(source),
            _ => None,
        }
    }

    fn is_source(&self, idx: usize) -> bool {
        matches!(
            self.units.get(idx),
            Some(Some(Unit {
                kind: UnitKind::Source(_),
                ..
            }))
        )
    }

    fn source_ended(&self, id: UnitId) -> bool {
        match self.units.get(id.index() as usize) {
            Some(Some(unit)) => matches!(&unit.kind, UnitKind::Source(s) if s.ended),
            _ => true,
        }
    }

    /// Units reachable from the destination, every unit after its inputs.
    /// Hand the vector back through `self.order` to keep its allocation.
    fn take_processing_order(&mut self) -> Vec<UnitId> {
        let mut order = std::mem::take(&mut self.order);
        let mut visited = std::mem::take(&mut self.visited);
        order.clear();
        visited.clear();
        visited.resize(self.units.len(), false);
        self.visit(DESTINATION, &mut visited, &mut order);
        self.visited = visited;
        order
    }

    fn visit(&self, unit: UnitId, visited: &mut [bool], order: &mut Vec<UnitId>) {
        let idx = unit.index() as usize;
        if idx >= visited.len() || visited[idx] || self.units[idx].is_none() {
            return;
        }
        visited[idx] = true;
        for &(from, to) in &self.edges {
            if to == unit {
                self.visit(from, visited, order);
            }
        }
        order.push(unit);
    }

    /// Processes one unit for this block. Returns `true` if a source ended.
    fn process_unit(&mut self, idx: usize, block_start: u64, frames: usize) -> bool {
        let channels = self.channels;
        let Some(mut unit) = self.units[idx].take() else {
            return false;
        };
        unit.output.clear();
        unit.output.resize(frames * channels, 0.0);

        let id = UnitId::from_raw(idx as u32);
        if !matches!(unit.kind, UnitKind::Source(_)) {
            for &(from, to) in &self.edges {
                if to != id {
                    continue;
                }
                if let Some(Some(input)) = self.units.get(from.index() as usize) {
                    for (out, sample) in unit.output.iter_mut().zip(&input.output) {
                        *out += *sample;
                    }
                }
            }
        }

        let mut ended = false;
        match &mut unit.kind {
            UnitKind::Destination => {}
            UnitKind::Gain { value } => {
                for sample in &mut unit.output {
                    *sample *= *value;
                }
            }
            UnitKind::Effect(effects) => {
                for (channel, effect) in effects.iter_mut().enumerate() {
                    for frame in 0..frames {
                        let sample = &mut unit.output[frame * channels + channel];
                        *sample = effect.process(*sample);
                    }
                }
            }
            UnitKind::Source(source) => {
                ended = render_source(source, &mut unit.output, block_start, frames, channels);
            }
        }

        self.units[idx] = Some(unit);
        ended
    }

    /// Frees released groups whose sources have all ended or never started.
    fn collect_released(&mut self) {
        let mut pending = std::mem::take(&mut self.released);
        pending.retain(|group| {
            let idle = group.iter().all(|&id| match self.units.get(id.index() as usize) {
                Some(Some(Unit {
                    kind: UnitKind::Source(s),
                    ..
                })) => s.ended || s.start_frame.is_none(),
                _ => true,
            });
            if idle {
                for &id in group {
                    let idx = id.index() as usize;
                    if let Some(slot) = self.units.get_mut(idx) {
                        *slot = None;
                    }
                    self.sources.retain(|&s| s != idx);
                }
                self.edges
                    .retain(|(from, to)| !group.contains(from) && !group.contains(to));
                tracing::debug!(units = group.len(), "freed released units");
            }
            !idle
        });
        self.released = pending;
    }
}

/// Output frames covered by a buffer of `duration` seconds scheduled at
/// `when`: from its own start frame up to the frame the next back-to-back
/// buffer starts on.
fn output_length(when: f64, duration: f64, sample_rate: f64) -> u64 {
    let start = (when * sample_rate).round();
    let end = ((when + duration) * sample_rate).round();
    if start.is_finite() && end.is_finite() {
        (end - start).max(0.0) as u64
    } else {
        (duration * sample_rate).round().max(0.0) as u64
    }
}

/// Renders one block of a source into `out`. Returns `true` if the source
/// reached its end during this block.
///
/// The read position is derived from the count of rendered frames, so
/// resampled sources end exactly `length` frames after they start.
fn render_source(
    source: &mut SourceState,
    out: &mut [f32],
    block_start: u64,
    frames: usize,
    channels: usize,
) -> bool {
    let Some(start) = source.start_frame else {
        return false;
    };
    if source.ended || block_start + frames as u64 <= start {
        return false;
    }

    let total = source.buffer.frame_count();
    let first = start.saturating_sub(block_start) as usize;
    let buffer_channels = source.buffer.channel_count();
    for frame in first..frames {
        if source.played >= source.length {
            break;
        }
        if total > 0 {
            let position = source.played as f64 * source.step;
            let base = (position as usize).min(total - 1);
            let frac = (position - base as f64) as f32;
            for channel in 0..channels {
                let data = match buffer_channels {
                    1 => source.buffer.channel(0),
                    n if channel < n => source.buffer.channel(channel),
                    _ => None,
                };
                if let Some(data) = data {
                    let a = data[base];
                    let b = data.get(base + 1).copied().unwrap_or(a);
                    out[frame * channels + channel] = a + (b - a) * frac;
                }
            }
        }
        source.played += 1;
    }

    if source.played >= source.length {
        source.ended = true;
        return true;
    }
    false
}

impl Patchbay for RenderContext {
    fn connect_units(&self, from: UnitId, to: UnitId) {
        let mut state = self.state.lock();
        let exists = |id: UnitId| matches!(state.units.get(id.index() as usize), Some(Some(_)));
        if !exists(from) || !exists(to) {
            tracing::warn!(%from, %to, "connect on unknown unit ignored");
            return;
        }
        if !state.edges.contains(&(from, to)) {
            state.edges.push((from, to));
        }
    }

    fn disconnect_units(&self, from: UnitId, to: UnitId) {
        self.state.lock().edges.retain(|&e| e != (from, to));
    }

    fn release_units(&self, units: &[UnitId]) {
        let mut state = self.state.lock();
        let group: Vec<UnitId> = units.iter().copied().filter(|&u| u != DESTINATION).collect();
        if group.is_empty() {
            return;
        }
        state.released.push(group);
        state.collect_released();
    }
}

impl PlaybackClock for RenderContext {
    fn sample_rate(&self) -> u32 {
        self.state.lock().sample_rate
    }

    fn now(&self) -> f64 {
        let state = self.state.lock();
        state.frames_rendered as f64 / state.sample_rate as f64
    }

    fn suspend(&self) {
        self.state.lock().suspended = true;
    }

    fn resume(&self) {
        self.state.lock().suspended = false;
    }

    fn is_suspended(&self) -> bool {
        self.state.lock().suspended
    }

    fn destination(&self) -> UnitId {
        DESTINATION
    }

    fn create_gain(&self, value: f32) -> UnitId {
        self.state.lock().insert(UnitKind::Gain { value })
    }

    fn create_source(&self, buffer: AudioBuffer) -> UnitId {
        let mut state = self.state.lock();
        let step = buffer.sample_rate() as f64 / state.sample_rate as f64;
        state.insert(UnitKind::Source(SourceState {
            buffer,
            start_frame: None,
            length: 0,
            played: 0,
            step,
            ended: false,
        }))
    }

    fn set_gain(&self, unit: UnitId, value: f32) {
        if let Some(Unit {
            kind: UnitKind::Gain { value: current },
            ..
        }) = self.state.lock().unit_mut(unit)
        {
            *current = value;
        }
    }

    fn gain(&self, unit: UnitId) -> Option<f32> {
        match self.state.lock().units.get(unit.index() as usize) {
            Some(Some(Unit {
                kind: UnitKind::Gain { value },
                ..
            })) => Some(*value),
            _ => None,
        }
    }

    fn start(&self, source: UnitId, when: f64) {
        let mut state = self.state.lock();
        let sample_rate = state.sample_rate as f64;
        let scheduled = (when * sample_rate).round();
        let frame = if scheduled.is_finite() && scheduled > 0.0 {
            (scheduled as u64).max(state.frames_rendered)
        } else {
            state.frames_rendered
        };
        match state.source_mut(source) {
            Some(s) if s.start_frame.is_none() => {
                s.length = output_length(when, s.buffer.duration_secs(), sample_rate);
                s.start_frame = Some(frame);
            }
            Some(_) => tracing::warn!(%source, "source already started"),
            None => tracing::warn!(%source, "start on unknown source ignored"),
        }
    }

    fn stop(&self, source: UnitId) {
        let mut state = self.state.lock();
        if let Some(s) = state.source_mut(source) {
            if !s.ended {
                s.ended = true;
                drop(state);
                self.ended.notify_all();
            }
        }
    }

    fn has_ended(&self, source: UnitId) -> bool {
        self.state.lock().source_ended(source)
    }

    fn wait_for_end(&self, source: UnitId, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.source_ended(source) {
                return true;
            }
            if self.ended.wait_until(&mut state, deadline).timed_out() {
                return state.source_ended(source);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segue_core::OnePole;

    fn ramp(frames: usize, sample_rate: u32) -> AudioBuffer {
        AudioBuffer::new(vec![(1..=frames).map(|i| i as f32).collect()], sample_rate).unwrap()
    }

    #[test]
    fn source_starts_on_exact_frame() {
        let ctx = RenderContext::new(100, 1);
        let src = ctx.create_source(ramp(4, 100));
        ctx.connect_units(src, ctx.destination());
        ctx.start(src, 0.03);

        let out = ctx.render_frames(8);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0]);
        assert!(ctx.has_ended(src));
        assert_eq!(ctx.now(), 0.08);
    }

    #[test]
    fn past_start_plays_immediately() {
        let ctx = RenderContext::new(100, 1);
        ctx.render_frames(10);
        let src = ctx.create_source(ramp(2, 100));
        ctx.connect_units(src, ctx.destination());
        ctx.start(src, 0.0);
        assert_eq!(ctx.render_frames(3), vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn mono_feeds_every_channel_and_extra_channels_drop() {
        let ctx = RenderContext::new(10, 2);
        let mono = ctx.create_source(ramp(2, 10));
        ctx.connect_units(mono, ctx.destination());
        ctx.start(mono, 0.0);
        assert_eq!(ctx.render_frames(2), vec![1.0, 1.0, 2.0, 2.0]);

        let ctx = RenderContext::new(10, 1);
        let stereo =
            ctx.create_source(AudioBuffer::new(vec![vec![1.0, 2.0], vec![9.0, 9.0]], 10).unwrap());
        ctx.connect_units(stereo, ctx.destination());
        ctx.start(stereo, 0.0);
        assert_eq!(ctx.render_frames(2), vec![1.0, 2.0]);
    }

    #[test]
    fn gain_scales_and_updates() {
        let ctx = RenderContext::new(10, 1);
        let src = ctx.create_source(AudioBuffer::new(vec![vec![1.0; 4]], 10).unwrap());
        let gain = ctx.create_gain(0.5);
        ctx.connect_units(src, gain);
        ctx.connect_units(gain, ctx.destination());
        ctx.start(src, 0.0);
        assert_eq!(ctx.render_frames(2), vec![0.5, 0.5]);
        ctx.set_gain(gain, 2.0);
        assert_eq!(ctx.gain(gain), Some(2.0));
        assert_eq!(ctx.render_frames(2), vec![2.0, 2.0]);
    }

    #[test]
    fn resamples_with_linear_interpolation() {
        let ctx = RenderContext::new(20, 1);
        let src = ctx.create_source(ramp(3, 10));
        ctx.connect_units(src, ctx.destination());
        ctx.start(src, 0.0);
        assert_eq!(
            ctx.render_frames(7),
            vec![1.0, 1.5, 2.0, 2.5, 3.0, 3.0, 0.0]
        );
    }

    #[test]
    fn resampled_source_spans_rounded_output_length() {
        let ctx = RenderContext::new(48000, 1);
        let src = ctx.create_source(AudioBuffer::new(vec![vec![1.0; 441]], 44100).unwrap());
        ctx.connect_units(src, ctx.destination());
        ctx.start(src, 0.0);

        let out = ctx.render_frames(600);
        assert!(out[..480].iter().all(|&s| s == 1.0));
        assert!(out[480..].iter().all(|&s| s == 0.0));
        assert!(ctx.has_ended(src));
    }

    #[test]
    fn back_to_back_resampled_sources_neither_gap_nor_overlap() {
        let ctx = RenderContext::new(48000, 1);
        let mut when = 0.0;
        for _ in 0..5 {
            let buffer = AudioBuffer::new(vec![vec![1.0; 4410]], 44100).unwrap();
            let duration = buffer.duration_secs();
            let src = ctx.create_source(buffer);
            ctx.connect_units(src, ctx.destination());
            ctx.start(src, when);
            when += duration;
        }

        let out = ctx.render_frames(30000);
        assert!(out[..24000].iter().all(|&s| s == 1.0));
        assert!(out[24000..].iter().all(|&s| s == 0.0));
        assert_eq!(ctx.active_sources(), 0);
    }

    #[test]
    fn freed_sources_leave_the_live_list() {
        let ctx = RenderContext::new(10, 1);
        let src = ctx.create_source(ramp(2, 10));
        let gain = ctx.create_gain(1.0);
        ctx.connect_units(src, gain);
        ctx.start(src, 0.0);
        ctx.release_units(&[src, gain]);
        assert_eq!(ctx.state.lock().sources, vec![src.index() as usize]);

        ctx.render_frames(4);
        assert!(ctx.state.lock().sources.is_empty());
        assert_eq!(ctx.unit_count(), 1);
        assert!(!ctx.is_connected(src, gain));
    }

    #[test]
    fn suspended_context_is_silent_and_frozen() {
        let ctx = RenderContext::new(10, 1);
        let src = ctx.create_source(ramp(4, 10));
        ctx.connect_units(src, ctx.destination());
        ctx.start(src, 0.0);
        ctx.render_frames(1);
        ctx.suspend();
        assert!(ctx.is_suspended());
        assert_eq!(ctx.render_frames(3), vec![0.0; 3]);
        assert_eq!(ctx.now(), 0.1);
        ctx.resume();
        assert_eq!(ctx.render_frames(2), vec![2.0, 3.0]);
    }

    #[test]
    fn effect_runs_per_channel() {
        let ctx = RenderContext::new(48000, 2);
        let src = ctx.create_source(AudioBuffer::new(vec![vec![1.0; 64]], 48000).unwrap());
        let lowpass = ctx.create_effect(|| Box::new(OnePole::new(48000.0, 200.0)));
        ctx.connect_units(src, lowpass);
        ctx.connect_units(lowpass, ctx.destination());
        ctx.start(src, 0.0);
        let out = ctx.render_frames(4);
        assert!(out[0] > 0.0 && out[0] < 0.1);
        assert_eq!(out[0], out[1]);
        assert!(out[6] > out[0]);
    }

    #[test]
    fn stop_ends_source_and_wakes_waiters() {
        let ctx = RenderContext::new(10, 1);
        let src = ctx.create_source(ramp(100, 10));
        ctx.start(src, 0.0);
        assert!(!ctx.wait_for_end(src, Duration::from_millis(1)));
        ctx.stop(src);
        assert!(ctx.wait_for_end(src, Duration::from_millis(1)));
        assert_eq!(ctx.active_sources(), 0);
    }

    #[test]
    fn released_group_freed_after_source_ends() {
        let ctx = RenderContext::new(10, 1);
        let src = ctx.create_source(ramp(5, 10));
        let gain = ctx.create_gain(1.0);
        ctx.connect_units(src, gain);
        ctx.connect_units(gain, ctx.destination());
        ctx.start(src, 0.0);

        ctx.release_units(&[src, gain, ctx.destination()]);
        assert_eq!(ctx.unit_count(), 3);
        assert_eq!(ctx.render_frames(3), vec![1.0, 2.0, 3.0]);
        assert_eq!(ctx.render_frames(3), vec![4.0, 5.0, 0.0]);
        assert_eq!(ctx.unit_count(), 1);
        assert!(!ctx.is_connected(gain, ctx.destination()));
        assert!(ctx.has_ended(src));
    }

    #[test]
    fn never_started_group_freed_on_release() {
        let ctx = RenderContext::new(10, 1);
        let src = ctx.create_source(ramp(5, 10));
        ctx.connect_units(src, ctx.destination());
        ctx.release_units(&[src]);
        assert_eq!(ctx.unit_count(), 1);
    }
}
