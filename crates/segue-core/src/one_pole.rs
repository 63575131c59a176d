//! One-pole lowpass filter.
//!
//! ```text
//! y[n] = x[n] + coeff * (y[n-1] - x[n])
//! coeff = exp(-2π * freq / sample_rate)
//! ```
//!
//! 6 dB/octave, zero latency. The `play --lowpass` and `render --lowpass`
//! commands splice one of these into every segment as it starts.
//!
//! ```rust
//! use segue_core::{Effect, OnePole};
//!
//! let mut lp = OnePole::new(48000.0, 4000.0);
//! assert!(lp.process(1.0) < 1.0);
//! ```

use crate::effect::Effect;
use crate::math::flush_denormal;
use libm::expf;

/// One-pole (6 dB/oct) lowpass filter.
///
/// `coeff` stays in [0, 1) for any positive cutoff, so the filter is stable.
#[derive(Debug, Clone)]
pub struct OnePole {
    state: f32,
    coeff: f32,
    sample_rate: f32,
    freq: f32,
}

impl OnePole {
    /// Creates a lowpass with cutoff `freq_hz` at `sample_rate`.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        let mut filter = Self {
            state: 0.0,
            coeff: 0.0,
            sample_rate,
            freq: freq_hz,
        };
        filter.recalculate_coeff();
        filter
    }

    /// Sets the cutoff frequency in Hz.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.freq = freq_hz;
        self.recalculate_coeff();
    }

    /// Current cutoff frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.freq
    }

    fn recalculate_coeff(&mut self) {
        self.coeff = expf(-core::f32::consts::TAU * self.freq / self.sample_rate);
    }
}

impl Effect for OnePole {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.state = flush_denormal(input + self.coeff * (self.state - input));
        self.state
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }
}
