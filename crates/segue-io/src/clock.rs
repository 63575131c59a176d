//! The playback clock interface the orchestrator schedules against.
//!
//! A clock owns every processing unit (its destination, gain stages, buffer
//! sources, effects) and the timeline they play on. The orchestrator only
//! ever holds [`UnitId`]s; graphs wire those units through the clock's
//! [`Patchbay`] implementation.
//!
//! [`RenderContext`](crate::RenderContext) is the software implementation.

use std::time::Duration;

use segue_core::{AudioBuffer, Patchbay, UnitId};

/// A sample clock with schedulable sources.
pub trait PlaybackClock: Patchbay + 'static {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Current playback time in seconds. Frozen while suspended.
    fn now(&self) -> f64;

    /// Stops the timeline; output goes silent and `now()` stops advancing.
    fn suspend(&self);

    /// Restarts a suspended timeline.
    fn resume(&self);

    /// Returns `true` while suspended.
    fn is_suspended(&self) -> bool;

    /// The final output unit. Never released.
    fn destination(&self) -> UnitId;

    /// Creates a gain stage with the given linear factor.
    fn create_gain(&self, value: f32) -> UnitId;

    /// Creates an unstarted one-shot source that plays `buffer`.
    fn create_source(&self, buffer: AudioBuffer) -> UnitId;

    /// Sets a gain stage's factor. Unknown units are ignored.
    fn set_gain(&self, unit: UnitId, value: f32);

    /// Current factor of a gain stage.
    fn gain(&self, unit: UnitId) -> Option<f32>;

    /// Schedules `source` to begin at clock time `when` (seconds). Times in
    /// the past start at the next rendered frame. A source starts once.
    fn start(&self, source: UnitId, when: f64);

    /// Halts a source immediately; it counts as ended afterwards.
    fn stop(&self, source: UnitId);

    /// Returns `true` once `source` has played to its end or been stopped.
    /// Units the clock no longer knows about count as ended.
    fn has_ended(&self, source: UnitId) -> bool;

    /// Blocks until `source` ends or `timeout` elapses. Returns whether it
    /// ended.
    fn wait_for_end(&self, source: UnitId, timeout: Duration) -> bool;
}
