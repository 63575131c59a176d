//! The settings file format.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::paths;

/// Player settings.
///
/// # TOML Format
///
/// ```toml
/// [store]
/// root = "/home/u/.local/share/segue/tracks"
/// chunk_duration_secs = 10.0
///
/// [playback]
/// sample_rate = 48000
/// buffer_size = 512
/// channels = 2
/// volume = 1.0
/// start_delay_secs = 0.0
/// output_device = "Speakers"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Where tracks are kept and how they are sliced.
    pub store: StoreSettings,
    /// Output and orchestrator defaults.
    pub playback: PlaybackSettings,
}

/// The `[store]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    /// Root directory of the chunk store.
    pub root: PathBuf,
    /// Chunk length used when ingesting, in seconds.
    pub chunk_duration_secs: f64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            root: paths::default_store_dir(),
            chunk_duration_secs: 10.0,
        }
    }
}

/// The `[playback]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Render context sample rate in Hz.
    pub sample_rate: u32,
    /// Output buffer size in frames.
    pub buffer_size: u32,
    /// Output channel count.
    pub channels: u16,
    /// Initial orchestrator volume.
    pub volume: f32,
    /// Delay between `stream` and the first segment, in seconds.
    pub start_delay_secs: f64,
    /// Output device name; the system default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 512,
            channels: 2,
            volume: 1.0,
            start_delay_secs: 0.0,
            output_device: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let settings = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Load settings from the user settings file, or defaults when it does
    /// not exist.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = paths::settings_path();
        if path.is_file() {
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse and validate settings from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(toml_str)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save the settings to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::create_dir(parent, e))?;
            }
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the settings to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every value the player depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunk = self.store.chunk_duration_secs;
        if !chunk.is_finite() || chunk <= 0.0 {
            return Err(ConfigError::invalid(
                "store.chunk_duration_secs",
                format!("must be a positive number of seconds, got {chunk}"),
            ));
        }

        let playback = &self.playback;
        if playback.sample_rate == 0 {
            return Err(ConfigError::invalid("playback.sample_rate", "must be non-zero"));
        }
        if playback.buffer_size == 0 {
            return Err(ConfigError::invalid("playback.buffer_size", "must be non-zero"));
        }
        if playback.channels == 0 {
            return Err(ConfigError::invalid("playback.channels", "must be non-zero"));
        }
        if !playback.volume.is_finite() || playback.volume < 0.0 {
            return Err(ConfigError::invalid(
                "playback.volume",
                format!("must be finite and non-negative, got {}", playback.volume),
            ));
        }
        let delay = playback.start_delay_secs;
        if !delay.is_finite() || delay < 0.0 {
            return Err(ConfigError::invalid(
                "playback.start_delay_secs",
                format!("must be finite and non-negative, got {delay}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.playback.sample_rate, 48000);
        assert_eq!(settings.playback.channels, 2);
        assert_eq!(settings.store.chunk_duration_secs, 10.0);
        assert!(settings.playback.output_device.is_none());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_tables_fill_in_defaults() {
        let settings = Settings::from_toml(
            r#"
            [playback]
            volume = 0.25
            output_device = "Speakers"
            "#,
        )
        .unwrap();
        assert_eq!(settings.playback.volume, 0.25);
        assert_eq!(settings.playback.output_device.as_deref(), Some("Speakers"));
        assert_eq!(settings.playback.buffer_size, 512);
        assert_eq!(settings.store, StoreSettings::default());
    }

    #[test]
    fn toml_roundtrip() {
        let mut settings = Settings::default();
        settings.store.root = PathBuf::from("/srv/tracks");
        settings.store.chunk_duration_secs = 2.5;
        settings.playback.sample_rate = 44100;
        settings.playback.start_delay_secs = 0.1;
        settings.playback.output_device = Some("USB DAC".to_string());

        let text = settings.to_toml().unwrap();
        assert!(text.contains("[store]"));
        assert!(text.contains("[playback]"));
        assert_eq!(Settings::from_toml(&text).unwrap(), settings);
    }

    #[test]
    fn save_creates_parent_and_load_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let mut settings = Settings::default();
        settings.playback.volume = 0.8;

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = Settings::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Settings::from_toml("[playback\nvolume = 1").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cases: [(&str, &str); 7] = [
            ("[store]\nchunk_duration_secs = 0.0", "store.chunk_duration_secs"),
            ("[store]\nchunk_duration_secs = -1.0", "store.chunk_duration_secs"),
            ("[playback]\nsample_rate = 0", "playback.sample_rate"),
            ("[playback]\nbuffer_size = 0", "playback.buffer_size"),
            ("[playback]\nchannels = 0", "playback.channels"),
            ("[playback]\nvolume = -0.5", "playback.volume"),
            ("[playback]\nstart_delay_secs = nan", "playback.start_delay_secs"),
        ];
        for (text, expected) in cases {
            match Settings::from_toml(text) {
                Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected, "{text}"),
                other => panic!("{text}: expected invalid setting, got {other:?}"),
            }
        }
    }
}
