//! Clock-paced speech platform.
//!
//! Produces no audio. Each submitted utterance emits `Start`, one boundary
//! per word at a pace derived from words-per-minute and the request rate,
//! then `End`. Time only advances through [`PacedPlatform::tick`], so callers
//! drive it from their own loop and tests stay deterministic.

use super::{
    BoundaryUnit, EngineEvent, SpeechErrorKind, SpeechPlatform, SpeechRequest, TaggedEvent, Voice,
};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const VOICE_ID: &str = "paced-en";

#[derive(Debug)]
struct Utterance {
    generation: u64,
    boundaries: Vec<(usize, BoundaryUnit)>,
    next_boundary: usize,
    word_interval: Duration,
    elapsed: Duration,
    started: bool,
    paused: bool,
}

impl Utterance {
    fn new(generation: u64, request: &SpeechRequest, words_per_minute: u32) -> Self {
        let words_per_second = f64::from(words_per_minute.max(1)) * f64::from(request.rate()) / 60.0;
        Self {
            generation,
            boundaries: boundaries_for(request.text()),
            next_boundary: 0,
            word_interval: Duration::from_secs_f64(1.0 / words_per_second),
            elapsed: Duration::ZERO,
            started: false,
            paused: false,
        }
    }

    fn total(&self) -> Duration {
        self.word_interval * self.boundaries.len() as u32
    }
}

/// Word offsets in whitespace-collapsed text; the first word of every
/// sentence is reported as a sentence boundary.
fn boundaries_for(text: &str) -> Vec<(usize, BoundaryUnit)> {
    let mut offset = 0usize;
    let mut sentence_start = true;
    let mut boundaries = Vec::new();
    for word in text.split_whitespace() {
        let unit = if sentence_start {
            BoundaryUnit::Sentence
        } else {
            BoundaryUnit::Word
        };
        boundaries.push((offset, unit));
        offset += word.chars().count() + 1;
        sentence_start = word.ends_with(['.', '!', '?']);
    }
    boundaries
}

#[derive(Debug)]
pub struct PacedPlatform {
    words_per_minute: u32,
    active: Option<Utterance>,
    queued: Vec<TaggedEvent>,
    last_tick: Option<Instant>,
}

impl PacedPlatform {
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute,
            active: None,
            queued: Vec::new(),
            last_tick: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Advance the clock to `now`, queueing every event that became due.
    pub fn tick(&mut self, now: Instant) {
        let delta = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_tick = Some(now);

        let Some(utterance) = self.active.as_mut() else {
            return;
        };
        if !utterance.started {
            utterance.started = true;
            self.queued
                .push(TaggedEvent::new(utterance.generation, EngineEvent::Start));
        } else if !utterance.paused {
            utterance.elapsed += delta;
        }
        if utterance.paused {
            return;
        }

        while utterance.next_boundary < utterance.boundaries.len()
            && utterance.elapsed >= utterance.word_interval * utterance.next_boundary as u32
        {
            let (char_index, unit) = utterance.boundaries[utterance.next_boundary];
            utterance.next_boundary += 1;
            self.queued.push(TaggedEvent::new(
                utterance.generation,
                EngineEvent::Boundary { char_index, unit },
            ));
        }

        if utterance.next_boundary == utterance.boundaries.len()
            && utterance.elapsed >= utterance.total()
        {
            trace!(generation = utterance.generation, "Paced utterance complete");
            self.queued
                .push(TaggedEvent::new(utterance.generation, EngineEvent::End));
            self.active = None;
        }
    }

    fn interrupt_active(&mut self) {
        if let Some(old) = self.active.take() {
            debug!(generation = old.generation, "Interrupting paced utterance");
            self.queued.push(TaggedEvent::new(
                old.generation,
                EngineEvent::Error(SpeechErrorKind::Interrupted),
            ));
        }
    }
}

impl SpeechPlatform for PacedPlatform {
    fn submit(&mut self, generation: u64, request: &SpeechRequest) {
        self.interrupt_active();
        let utterance = Utterance::new(generation, request, self.words_per_minute);
        debug!(
            generation,
            words = utterance.boundaries.len(),
            interval_ms = utterance.word_interval.as_millis() as u64,
            "Paced utterance queued"
        );
        self.active = Some(utterance);
    }

    fn cancel(&mut self) {
        self.interrupt_active();
    }

    fn pause(&mut self) {
        if let Some(utterance) = self.active.as_mut().filter(|u| u.started && !u.paused) {
            utterance.paused = true;
            self.queued
                .push(TaggedEvent::new(utterance.generation, EngineEvent::Pause));
        }
    }

    fn resume(&mut self) {
        if let Some(utterance) = self.active.as_mut().filter(|u| u.paused) {
            utterance.paused = false;
            self.queued
                .push(TaggedEvent::new(utterance.generation, EngineEvent::Resume));
        }
    }

    fn poll_events(&mut self) -> Vec<TaggedEvent> {
        std::mem::take(&mut self.queued)
    }

    fn voices(&self) -> Vec<Voice> {
        vec![Voice {
            id: VOICE_ID.to_string(),
            name: "Paced narrator".to_string(),
            lang: "en".to_string(),
            default: true,
        }]
    }
}
