//! The [`Effect`] trait: a mono, sample-rate aware DSP stage.
//!
//! Effects are what callers splice into a segment's processing graph (for
//! example a [`OnePole`](crate::OnePole) lowpass inserted between the source
//! and the gain stage). The playback clock runs one instance per output
//! channel, so implementations only ever see a single channel.
//!
//! The trait is object-safe; the clock stores effects as
//! `Box<dyn Effect + Send>`.

/// A mono audio processor.
///
/// Implementations must not allocate in [`process`](Self::process); it runs
/// on the audio thread.
pub trait Effect {
    /// Processes one sample.
    fn process(&mut self, input: f32) -> f32;

    /// Updates the sample rate and recomputes any rate-dependent state.
    fn set_sample_rate(&mut self, sample_rate: f32);
}
