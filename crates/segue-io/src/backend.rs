//! Pluggable audio output abstraction.
//!
//! [`AudioBackend`] keeps the playback pipeline independent of any platform
//! audio API. Live playback hands the backend an [`OutputCallback`] that
//! renders the orchestrator's [`RenderContext`](crate::RenderContext):
//!
//! ```text
//!  StreamOrchestrator ──schedules──▶ RenderContext ◀──render── OutputCallback
//!                                                                 ▲
//!                                              AudioBackend ──────┘ (audio thread)
//! ```
//!
//! Callbacks are boxed closures so the trait stays object-safe, and streams
//! come back as a type-erased [`StreamHandle`] that stops playback on drop.

use crate::Result;

/// Output device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether this is the host's default output.
    pub is_default: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Default channel count.
    pub channels: u16,
}

/// Configuration for building an output stream.
#[derive(Debug, Clone)]
pub struct BackendStreamConfig {
    /// Requested sample rate in Hz.
    pub sample_rate: u32,
    /// Preferred buffer size in frames.
    pub buffer_size: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Device name filter (case-insensitive substring); default device if `None`.
    pub device_name: Option<String>,
}

impl Default for BackendStreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 512,
            channels: 2,
            device_name: None,
        }
    }
}

/// Type-erased stream handle. The stream plays while the handle lives.
pub struct StreamHandle {
    _inner: Box<dyn Send>,
}

impl StreamHandle {
    /// Wraps a backend-specific stream object, keeping it alive until drop.
    pub fn new<T: Send + 'static>(stream: T) -> Self {
        Self {
            _inner: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

/// Fills an interleaved `[L0, R0, L1, R1, ...]` buffer on the audio thread.
pub type OutputCallback = Box<dyn FnMut(&mut [f32]) + Send>;

/// Receives human-readable stream errors.
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Platform audio output.
pub trait AudioBackend: Send {
    /// Backend name (e.g. "cpal").
    fn name(&self) -> &str;

    /// All output devices.
    fn list_devices(&self) -> Result<Vec<AudioDevice>>;

    /// The default output device, if any.
    fn default_output_device(&self) -> Result<Option<AudioDevice>>;

    /// Builds and starts an output stream driven by `callback`.
    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        callback: OutputCallback,
        error_callback: ErrorCallback,
    ) -> Result<StreamHandle>;
}
