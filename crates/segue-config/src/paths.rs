//! Platform-specific paths for settings and the default track store.
//!
//! - **User config**: `~/.config/segue/` (Linux), `~/Library/Application Support/segue/` (macOS), `%APPDATA%\segue\` (Windows)
//! - **Track store**: `~/.local/share/segue/tracks/` (Linux), `~/Library/Application Support/segue/tracks/` (macOS), `%APPDATA%\segue\tracks\` (Windows)

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "segue";

/// File name of the settings file inside [`user_config_dir`].
const SETTINGS_FILE: &str = "settings.toml";

/// Subdirectory of the data directory holding ingested tracks.
const TRACKS_SUBDIR: &str = "tracks";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the path of the user settings file.
pub fn settings_path() -> PathBuf {
    user_config_dir().join(SETTINGS_FILE)
}

/// Returns the default chunk store root.
///
/// Returns a fallback path if the data directory cannot be determined.
pub fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(TRACKS_SUBDIR)
}
