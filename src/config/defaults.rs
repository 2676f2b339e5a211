pub(crate) fn default_speech_rate() -> f32 {
    1.0
}

pub(crate) fn default_speech_pitch() -> f32 {
    1.0
}

pub(crate) fn default_speech_volume() -> f32 {
    1.0
}

pub(crate) fn default_words_per_minute() -> u32 {
    170
}

pub(crate) fn default_chars_per_page() -> usize {
    1800
}

pub(crate) fn default_highlight() -> crate::config::HighlightColor {
    crate::config::HighlightColor {
        r: 0.2,
        g: 0.4,
        b: 0.7,
        a: 0.15,
    }
}

pub(crate) fn default_ebook_convert_bin() -> String {
    "ebook-convert".to_string()
}

pub(crate) fn default_pdftotext_bin() -> String {
    "pdftotext".to_string()
}

pub(crate) fn default_output_dir() -> String {
    ".cache/conversions".to_string()
}

pub(crate) fn default_timer_minutes() -> u32 {
    10
}

pub(crate) fn default_focus_minutes() -> u32 {
    25
}

pub(crate) fn default_short_break_minutes() -> u32 {
    5
}

pub(crate) fn default_long_break_minutes() -> u32 {
    15
}

pub(crate) fn default_cycles_before_long_break() -> u32 {
    4
}

pub(crate) fn default_music_volume() -> f32 {
    0.8
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}
