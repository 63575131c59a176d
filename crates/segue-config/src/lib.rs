//! Settings for the segue player.
//!
//! Settings live in a single TOML file, by default under the user config
//! directory (see [`paths::settings_path`]). Missing tables and fields fall
//! back to defaults, so an empty file is a valid configuration.
//!
//! ```rust,no_run
//! use segue_config::Settings;
//!
//! let settings = Settings::load_or_default().unwrap();
//! println!("store: {}", settings.store.root.display());
//! println!("rate:  {} Hz", settings.playback.sample_rate);
//! ```

pub mod error;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use settings::{PlaybackSettings, Settings, StoreSettings};
