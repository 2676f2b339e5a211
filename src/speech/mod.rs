//! Speech engine adapter.
//!
//! The platform speech capability sits behind [`SpeechPlatform`]. Every event
//! it emits is tagged with the generation of the request that produced it, so
//! the coordinator can drop callbacks from utterances that were superseded or
//! stopped after the platform had already queued them.

mod adapter;
pub mod paced;

use serde::Serialize;

pub use adapter::SpeechAdapter;

pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 10.0;
pub const MIN_PITCH: f32 = 0.0;
pub const MAX_PITCH: f32 = 2.0;
pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 1.0;

/// One utterance handed to the platform. Built fresh per playback; numeric
/// settings are coerced into range instead of being rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    text: String,
    rate: f32,
    pitch: f32,
    volume: f32,
    voice_id: Option<String>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice_id: None,
        }
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = clamp_or(rate, MIN_RATE, MAX_RATE, 1.0);
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = clamp_or(pitch, MIN_PITCH, MAX_PITCH, 1.0);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = clamp_or(volume, MIN_VOLUME, MAX_VOLUME, 1.0);
        self
    }

    pub fn with_voice(mut self, voice_id: Option<String>) -> Self {
        self.voice_id = voice_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn voice_id(&self) -> Option<&str> {
        self.voice_id.as_deref()
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryUnit {
    Word,
    Sentence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechErrorKind {
    /// Superseded by a newer request or cancelled; never shown to the user.
    Interrupted,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Start,
    Boundary { char_index: usize, unit: BoundaryUnit },
    Pause,
    Resume,
    End,
    Error(SpeechErrorKind),
}

/// An engine event plus the generation of the request that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: EngineEvent,
}

impl TaggedEvent {
    pub fn new(generation: u64, event: EngineEvent) -> Self {
        Self { generation, event }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub lang: String,
    pub default: bool,
}

/// Platform text-to-speech capability.
///
/// Calls return immediately; results come back through [`poll_events`].
///
/// [`poll_events`]: SpeechPlatform::poll_events
pub trait SpeechPlatform {
    fn submit(&mut self, generation: u64, request: &SpeechRequest);
    fn cancel(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn poll_events(&mut self) -> Vec<TaggedEvent>;

    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }
}
