use super::defaults;
use super::models::{AppConfig, HighlightColor, LogLevel};
use serde::Deserialize;

/// On-disk layout of `conf/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    speech: SpeechConfig,
    #[serde(default)]
    reading: ReadingConfig,
    #[serde(default)]
    conversion: ConversionConfig,
    #[serde(default)]
    widgets: WidgetsConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            speech_rate: tables.speech.rate,
            speech_pitch: tables.speech.pitch,
            speech_volume: tables.speech.volume,
            speech_voice_id: tables.speech.voice_id,
            words_per_minute: tables.speech.words_per_minute,
            chars_per_page: tables.reading.chars_per_page,
            highlight: tables.reading.highlight,
            ebook_convert_bin: tables.conversion.ebook_convert_bin,
            pdftotext_bin: tables.conversion.pdftotext_bin,
            conversion_output_dir: tables.conversion.output_dir,
            timer_minutes: tables.widgets.timer_minutes,
            pomodoro_focus_minutes: tables.widgets.focus_minutes,
            pomodoro_short_break_minutes: tables.widgets.short_break_minutes,
            pomodoro_long_break_minutes: tables.widgets.long_break_minutes,
            pomodoro_cycles_before_long_break: tables.widgets.cycles_before_long_break,
            music_volume: tables.widgets.music_volume,
            log_level: tables.logging.log_level,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            speech: SpeechConfig {
                rate: config.speech_rate,
                pitch: config.speech_pitch,
                volume: config.speech_volume,
                voice_id: config.speech_voice_id.clone(),
                words_per_minute: config.words_per_minute,
            },
            reading: ReadingConfig {
                chars_per_page: config.chars_per_page,
                highlight: config.highlight,
            },
            conversion: ConversionConfig {
                ebook_convert_bin: config.ebook_convert_bin.clone(),
                pdftotext_bin: config.pdftotext_bin.clone(),
                output_dir: config.conversion_output_dir.clone(),
            },
            widgets: WidgetsConfig {
                timer_minutes: config.timer_minutes,
                focus_minutes: config.pomodoro_focus_minutes,
                short_break_minutes: config.pomodoro_short_break_minutes,
                long_break_minutes: config.pomodoro_long_break_minutes,
                cycles_before_long_break: config.pomodoro_cycles_before_long_break,
                music_volume: config.music_volume,
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct SpeechConfig {
    #[serde(default = "defaults::default_speech_rate")]
    rate: f32,
    #[serde(default = "defaults::default_speech_pitch")]
    pitch: f32,
    #[serde(default = "defaults::default_speech_volume")]
    volume: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    voice_id: Option<String>,
    #[serde(default = "defaults::default_words_per_minute")]
    words_per_minute: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        SpeechConfig {
            rate: defaults::default_speech_rate(),
            pitch: defaults::default_speech_pitch(),
            volume: defaults::default_speech_volume(),
            voice_id: None,
            words_per_minute: defaults::default_words_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ReadingConfig {
    #[serde(default = "defaults::default_chars_per_page")]
    chars_per_page: usize,
    #[serde(default = "defaults::default_highlight")]
    highlight: HighlightColor,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        ReadingConfig {
            chars_per_page: defaults::default_chars_per_page(),
            highlight: defaults::default_highlight(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ConversionConfig {
    #[serde(default = "defaults::default_ebook_convert_bin")]
    ebook_convert_bin: String,
    #[serde(default = "defaults::default_pdftotext_bin")]
    pdftotext_bin: String,
    #[serde(default = "defaults::default_output_dir")]
    output_dir: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        ConversionConfig {
            ebook_convert_bin: defaults::default_ebook_convert_bin(),
            pdftotext_bin: defaults::default_pdftotext_bin(),
            output_dir: defaults::default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct WidgetsConfig {
    #[serde(default = "defaults::default_timer_minutes")]
    timer_minutes: u32,
    #[serde(default = "defaults::default_focus_minutes")]
    focus_minutes: u32,
    #[serde(default = "defaults::default_short_break_minutes")]
    short_break_minutes: u32,
    #[serde(default = "defaults::default_long_break_minutes")]
    long_break_minutes: u32,
    #[serde(default = "defaults::default_cycles_before_long_break")]
    cycles_before_long_break: u32,
    #[serde(default = "defaults::default_music_volume")]
    music_volume: f32,
}

impl Default for WidgetsConfig {
    fn default() -> Self {
        WidgetsConfig {
            timer_minutes: defaults::default_timer_minutes(),
            focus_minutes: defaults::default_focus_minutes(),
            short_break_minutes: defaults::default_short_break_minutes(),
            long_break_minutes: defaults::default_long_break_minutes(),
            cycles_before_long_break: defaults::default_cycles_before_long_break(),
            music_volume: defaults::default_music_volume(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
