//! Configuration loading for the reader.
//!
//! User-tunable settings are loaded from `conf/config.toml` (or the path in
//! `READALONG_CONFIG`). Missing or invalid entries fall back to defaults and
//! numeric values are clamped, so a bad file never stops the reader.

mod defaults;
mod io;
mod models;
mod tables;

use std::path::PathBuf;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{AppConfig, HighlightColor, LogLevel};

pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

pub fn config_path_from_env() -> PathBuf {
    std::env::var_os("READALONG_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
