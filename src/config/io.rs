use super::models::AppConfig;
use super::tables::ConfigTables;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load the configuration at `path`, falling back to defaults when the file is
/// missing or unreadable so the reader can always start.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %path.display(), "No config file loaded: {err}");
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded reader configuration");
            config
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Invalid config TOML; falling back to defaults: {err:#}"
            );
            AppConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let tables: ConfigTables = toml::from_str(contents).context("Parsing config tables")?;
    Ok(AppConfig::from(tables).clamped())
}

pub fn serialize_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(&ConfigTables::from(config)).context("Serializing config tables")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn tables_map_onto_flat_fields() {
        let config = parse_config(
            r#"
[speech]
rate = 1.5
voice_id = "en-GB"

[conversion]
ebook_convert_bin = "/opt/calibre/ebook-convert"

[widgets]
focus_minutes = 50

[logging]
log_level = "debug"
"#,
        )
        .unwrap();

        assert!((config.speech_rate - 1.5).abs() < f32::EPSILON);
        assert_eq!(config.speech_voice_id.as_deref(), Some("en-GB"));
        assert_eq!(config.ebook_convert_bin, "/opt/calibre/ebook-convert");
        assert_eq!(config.pomodoro_focus_minutes, 50);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.chars_per_page, AppConfig::default().chars_per_page);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = parse_config(
            r#"
[speech]
rate = 15.0
pitch = -1.0
volume = 1.5

[widgets]
music_volume = 3.0
cycles_before_long_break = 0
"#,
        )
        .unwrap();

        assert!((config.speech_rate - 10.0).abs() < f32::EPSILON);
        assert!(config.speech_pitch.abs() < f32::EPSILON);
        assert!((config.speech_volume - 1.0).abs() < f32::EPSILON);
        assert!((config.music_volume - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.pomodoro_cycles_before_long_break, 1);
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = AppConfig::default();
        config.speech_voice_id = Some("voice-2".to_string());
        config.chars_per_page = 900;
        let raw = serialize_config(&config).unwrap();
        assert!(raw.contains("[speech]"));
        assert_eq!(parse_config(&raw).unwrap(), config);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[speech\nrate = ").unwrap();
        assert_eq!(load_config(&path), AppConfig::default());
        assert_eq!(load_config(&dir.path().join("missing.toml")), AppConfig::default());
    }
}
