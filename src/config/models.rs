use serde::Deserialize;

use crate::speech::{MAX_PITCH, MAX_RATE, MAX_VOLUME, MIN_PITCH, MIN_RATE, MIN_VOLUME};

/// Flattened reader configuration; the on-disk layout lives in `tables`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub speech_rate: f32,
    pub speech_pitch: f32,
    pub speech_volume: f32,
    pub speech_voice_id: Option<String>,
    pub words_per_minute: u32,
    pub chars_per_page: usize,
    pub highlight: HighlightColor,
    pub ebook_convert_bin: String,
    pub pdftotext_bin: String,
    pub conversion_output_dir: String,
    pub timer_minutes: u32,
    pub pomodoro_focus_minutes: u32,
    pub pomodoro_short_break_minutes: u32,
    pub pomodoro_long_break_minutes: u32,
    pub pomodoro_cycles_before_long_break: u32,
    pub music_volume: f32,
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            speech_rate: crate::config::defaults::default_speech_rate(),
            speech_pitch: crate::config::defaults::default_speech_pitch(),
            speech_volume: crate::config::defaults::default_speech_volume(),
            speech_voice_id: None,
            words_per_minute: crate::config::defaults::default_words_per_minute(),
            chars_per_page: crate::config::defaults::default_chars_per_page(),
            highlight: crate::config::defaults::default_highlight(),
            ebook_convert_bin: crate::config::defaults::default_ebook_convert_bin(),
            pdftotext_bin: crate::config::defaults::default_pdftotext_bin(),
            conversion_output_dir: crate::config::defaults::default_output_dir(),
            timer_minutes: crate::config::defaults::default_timer_minutes(),
            pomodoro_focus_minutes: crate::config::defaults::default_focus_minutes(),
            pomodoro_short_break_minutes: crate::config::defaults::default_short_break_minutes(),
            pomodoro_long_break_minutes: crate::config::defaults::default_long_break_minutes(),
            pomodoro_cycles_before_long_break:
                crate::config::defaults::default_cycles_before_long_break(),
            music_volume: crate::config::defaults::default_music_volume(),
            log_level: crate::config::defaults::default_log_level(),
        }
    }
}

impl AppConfig {
    /// Pull every numeric setting back into its supported range.
    pub fn clamped(mut self) -> Self {
        self.speech_rate = self.speech_rate.clamp(MIN_RATE, MAX_RATE);
        self.speech_pitch = self.speech_pitch.clamp(MIN_PITCH, MAX_PITCH);
        self.speech_volume = self.speech_volume.clamp(MIN_VOLUME, MAX_VOLUME);
        self.words_per_minute = self.words_per_minute.clamp(40, 600);
        self.chars_per_page = self.chars_per_page.clamp(200, 20_000);
        self.timer_minutes = self.timer_minutes.clamp(1, 24 * 60);
        self.pomodoro_focus_minutes = self.pomodoro_focus_minutes.clamp(1, 180);
        self.pomodoro_short_break_minutes = self.pomodoro_short_break_minutes.clamp(1, 60);
        self.pomodoro_long_break_minutes = self.pomodoro_long_break_minutes.clamp(1, 120);
        self.pomodoro_cycles_before_long_break = self.pomodoro_cycles_before_long_break.max(1);
        self.music_volume = self.music_volume.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize, ts_rs::TS)]
#[ts(export)]
pub struct HighlightColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
