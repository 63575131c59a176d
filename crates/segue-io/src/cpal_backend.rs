//! cpal-based [`AudioBackend`] implementation.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use segue_io::RenderContext;
//! use segue_io::backend::{AudioBackend, BackendStreamConfig};
//! use segue_io::cpal_backend::CpalBackend;
//!
//! let context = Arc::new(RenderContext::new(48000, 2));
//! let render = Arc::clone(&context);
//! let stream = CpalBackend::new().build_output_stream(
//!     &BackendStreamConfig::default(),
//!     Box::new(move |out| render.render(out)),
//!     Box::new(|err| eprintln!("audio error: {err}")),
//! )?;
//! // Plays until `stream` is dropped.
//! ```

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host};

use crate::backend::{
    AudioBackend, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle,
};
use crate::{AudioDevice, Error, Result};

fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

fn describe(device: &Device, name: String, default_name: Option<&str>) -> AudioDevice {
    let config = device.default_output_config().ok();
    AudioDevice {
        is_default: default_name == Some(name.as_str()),
        name,
        default_sample_rate: config.as_ref().map_or(48000, |c| c.sample_rate()),
        channels: config.as_ref().map_or(2, |c| c.channels()),
    }
}

/// Output backend on the platform's default cpal host (ALSA, CoreAudio,
/// WASAPI).
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    /// Creates a backend on the default host.
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal backend initialized");
        Self { host }
    }

    /// Finds an output device whose name contains `name` (case-insensitive),
    /// or the default output.
    fn find_output_device(&self, name: Option<&str>) -> Result<Device> {
        let Some(search) = name else {
            return self.host.default_output_device().ok_or(Error::NoDevice);
        };
        let search_lower = search.to_lowercase();
        let devices = self
            .host
            .output_devices()
            .map_err(|e| Error::Stream(e.to_string()))?;
        for device in devices {
            if let Ok(dev_name) = device_name(&device)
                && dev_name.to_lowercase().contains(&search_lower)
            {
                return Ok(device);
            }
        }
        Err(Error::DeviceNotFound(format!(
            "no output device matching '{search}'"
        )))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| device_name(&d).ok());
        let devices = self
            .host
            .output_devices()
            .map_err(|e| Error::Stream(e.to_string()))?;
        Ok(devices
            .filter_map(|device| {
                let name = device_name(&device).ok()?;
                Some(describe(&device, name, default_name.as_deref()))
            })
            .collect())
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        Ok(self.host.default_output_device().and_then(|device| {
            let name = device_name(&device).ok()?;
            let default_name = name.clone();
            Some(describe(&device, name, Some(&default_name)))
        }))
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: OutputCallback,
        mut error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let device = self.find_output_device(config.device_name.as_deref())?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback(data);
                },
                move |err| {
                    error_callback(&err.to_string());
                },
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            channels = config.channels,
            sample_rate = config.sample_rate,
            buffer_size = config.buffer_size,
            "output stream started"
        );

        Ok(StreamHandle::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_name() {
        assert_eq!(CpalBackend::new().name(), "cpal");
    }

    #[test]
    fn missing_device_is_reported() {
        let backend = CpalBackend::new();
        let result = backend.find_output_device(Some("segue-no-such-device-0xdeadbeef"));
        assert!(result.is_err());
    }
}
