//! Tempest CLI
//!
//! Headless front end for the playback engine: lists output devices and
//! plays files in order.

pub mod config;
pub mod playlist;

pub use config::{load_settings, ConfigError, ENV_PREFIX};
pub use playlist::{format_position, Playlist, PlaylistAction};
