//! Reading-state coordinator.
//!
//! All playback bookkeeping goes through [`transition`]: it mutates the state
//! and returns the platform work to perform, which keeps the logic testable
//! without a speech engine. Engine events tagged with an older generation are
//! dropped before anything is touched.

use crate::speech::{
    BoundaryUnit, EngineEvent, PlaybackState, SpeechErrorKind, SpeechRequest, TaggedEvent,
};
use crate::tracker::{WordCursor, WordTracker};
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, info, trace, warn};

#[derive(Debug)]
pub enum ReadingEvent {
    Speak(SpeechRequest),
    Pause,
    Resume,
    Stop,
    Engine(TaggedEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadingAction {
    CancelUtterance,
    SubmitUtterance {
        generation: u64,
        request: SpeechRequest,
    },
    PauseUtterance,
    ResumeUtterance,
    SurfaceError(String),
}

#[derive(Debug, Clone, Default)]
pub struct ReadingState {
    playback: PlaybackState,
    text: Option<String>,
    tracker: Option<WordTracker>,
    cursor: Option<WordCursor>,
    generation: u64,
    last_error: Option<String>,
}

/// Highlighted word inside a caller-provided text slice, in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct HighlightSpan {
    pub word_index: usize,
    pub start: usize,
    pub end: usize,
}

impl HighlightSpan {
    /// Byte range of the span inside `slice`, for string slicing.
    pub fn byte_range(&self, slice: &str) -> Option<Range<usize>> {
        let mut boundaries = slice
            .char_indices()
            .map(|(idx, _)| idx)
            .chain(std::iter::once(slice.len()));
        let start = boundaries.nth(self.start)?;
        let end = if self.end == self.start {
            start
        } else {
            boundaries.nth(self.end - self.start - 1)?
        };
        Some(start..end)
    }
}

impl ReadingState {
    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    pub fn cursor(&self) -> Option<WordCursor> {
        self.cursor
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Word to highlight when `slice` is exactly the text being read.
    pub fn highlight_span(&self, slice: &str) -> Option<HighlightSpan> {
        if self.text.as_deref() != Some(slice) {
            return None;
        }
        self.highlight_span_at(slice, 0)
    }

    /// Word to highlight inside an enclosing `slice` (such as the full
    /// document around a read-aloud excerpt) whose spoken text starts at char
    /// `origin`. `None` unless the spoken text sits exactly there.
    pub fn highlight_span_at(&self, slice: &str, origin: usize) -> Option<HighlightSpan> {
        if self.playback == PlaybackState::Idle {
            return None;
        }
        let cursor = self.cursor?;
        let text = self.text.as_deref()?;
        let origin_byte = slice.char_indices().nth(origin).map(|(idx, _)| idx)?;
        if !slice[origin_byte..].starts_with(text) {
            return None;
        }
        let (start, end) = self.tracker.as_ref()?.source_span(cursor.word_index)?;
        Some(HighlightSpan {
            word_index: cursor.word_index,
            start: start + origin,
            end: end + origin,
        })
    }

    fn finish_utterance(&mut self) {
        self.playback = PlaybackState::Idle;
        self.cursor = None;
        self.text = None;
        self.tracker = None;
    }
}

pub fn transition(state: &mut ReadingState, event: ReadingEvent) -> Vec<ReadingAction> {
    match event {
        ReadingEvent::Speak(request) => on_speak(state, request),
        ReadingEvent::Pause => on_pause_command(state),
        ReadingEvent::Resume => on_resume_command(state),
        ReadingEvent::Stop => on_stop(state),
        ReadingEvent::Engine(tagged) => on_engine_event(state, tagged),
    }
}

fn on_speak(state: &mut ReadingState, request: SpeechRequest) -> Vec<ReadingAction> {
    if request.text().trim().is_empty() {
        warn!("Ignoring speak request with empty text");
        return Vec::new();
    }

    state.generation = state.generation.wrapping_add(1);
    state.playback = PlaybackState::Idle;
    state.cursor = None;
    state.last_error = None;
    state.tracker = Some(WordTracker::new(request.text()));
    state.text = Some(request.text().to_string());
    info!(
        generation = state.generation,
        chars = request.text().chars().count(),
        rate = request.rate(),
        pitch = request.pitch(),
        volume = request.volume(),
        "Submitting utterance"
    );

    vec![
        ReadingAction::CancelUtterance,
        ReadingAction::SubmitUtterance {
            generation: state.generation,
            request,
        },
    ]
}

fn on_pause_command(state: &mut ReadingState) -> Vec<ReadingAction> {
    if state.playback != PlaybackState::Playing {
        debug!(state = ?state.playback, "Pause ignored; nothing playing");
        return Vec::new();
    }
    state.playback = PlaybackState::Paused;
    vec![ReadingAction::PauseUtterance]
}

fn on_resume_command(state: &mut ReadingState) -> Vec<ReadingAction> {
    if state.playback != PlaybackState::Paused {
        debug!(state = ?state.playback, "Resume ignored; playback not paused");
        return Vec::new();
    }
    state.playback = PlaybackState::Playing;
    vec![ReadingAction::ResumeUtterance]
}

fn on_stop(state: &mut ReadingState) -> Vec<ReadingAction> {
    state.generation = state.generation.wrapping_add(1);
    state.finish_utterance();
    debug!(generation = state.generation, "Speech stopped");
    vec![ReadingAction::CancelUtterance]
}

fn on_engine_event(state: &mut ReadingState, tagged: TaggedEvent) -> Vec<ReadingAction> {
    if tagged.generation != state.generation {
        debug!(
            generation = tagged.generation,
            current = state.generation,
            event = ?tagged.event,
            "Ignoring stale speech event"
        );
        return Vec::new();
    }
    if state.text.is_none() {
        trace!(event = ?tagged.event, "Speech event after utterance finished");
        return Vec::new();
    }

    match tagged.event {
        EngineEvent::Start => {
            state.playback = PlaybackState::Playing;
            Vec::new()
        }
        EngineEvent::Boundary { char_index, unit } => {
            on_boundary(state, char_index, unit);
            Vec::new()
        }
        EngineEvent::Pause => {
            if state.playback == PlaybackState::Playing {
                state.playback = PlaybackState::Paused;
            }
            Vec::new()
        }
        EngineEvent::Resume => {
            if state.playback == PlaybackState::Paused {
                state.playback = PlaybackState::Playing;
            }
            Vec::new()
        }
        EngineEvent::End => {
            debug!(generation = state.generation, "Utterance finished");
            state.finish_utterance();
            Vec::new()
        }
        EngineEvent::Error(SpeechErrorKind::Interrupted) => {
            debug!(generation = state.generation, "Utterance interrupted");
            state.finish_utterance();
            Vec::new()
        }
        EngineEvent::Error(SpeechErrorKind::Other(message)) => {
            warn!(generation = state.generation, %message, "Speech engine error");
            state.finish_utterance();
            state.last_error = Some(message.clone());
            vec![ReadingAction::SurfaceError(message)]
        }
    }
}

fn on_boundary(state: &mut ReadingState, char_index: usize, unit: BoundaryUnit) {
    if state.playback != PlaybackState::Playing {
        trace!(char_index, state = ?state.playback, "Boundary outside active playback");
        return;
    }
    let Some(tracker) = state.tracker.as_ref() else {
        return;
    };
    state.cursor = tracker.advance(state.cursor, char_index);
    trace!(char_index, ?unit, cursor = ?state.cursor, "Boundary applied");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(state: &mut ReadingState, generation: u64, event: EngineEvent) -> Vec<ReadingAction> {
        transition(
            state,
            ReadingEvent::Engine(TaggedEvent::new(generation, event)),
        )
    }

    fn word_boundary(char_index: usize) -> EngineEvent {
        EngineEvent::Boundary {
            char_index,
            unit: BoundaryUnit::Word,
        }
    }

    fn speak(state: &mut ReadingState, text: &str) -> u64 {
        transition(state, ReadingEvent::Speak(SpeechRequest::new(text)));
        state.generation()
    }

    #[test]
    fn speak_emits_cancel_then_submit() {
        let mut state = ReadingState::default();
        let actions = transition(
            &mut state,
            ReadingEvent::Speak(SpeechRequest::new("Hello world")),
        );
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], ReadingAction::CancelUtterance);
        assert!(matches!(
            &actions[1],
            ReadingAction::SubmitUtterance { generation: 1, request } if request.text() == "Hello world"
        ));
        assert_eq!(state.playback(), PlaybackState::Idle);
        assert_eq!(state.text(), Some("Hello world"));
    }

    #[test]
    fn empty_text_leaves_state_untouched() {
        let mut state = ReadingState::default();
        let generation = speak(&mut state, "Hello world");
        engine(&mut state, generation, EngineEvent::Start);

        let actions = transition(&mut state, ReadingEvent::Speak(SpeechRequest::new("   ")));

        assert!(actions.is_empty());
        assert_eq!(state.generation(), generation);
        assert_eq!(state.playback(), PlaybackState::Playing);
        assert_eq!(state.text(), Some("Hello world"));
    }

    #[test]
    fn boundary_updates_cursor_while_playing() {
        let mut state = ReadingState::default();
        let generation = speak(&mut state, "Hello world");
        engine(&mut state, generation, EngineEvent::Start);
        engine(&mut state, generation, word_boundary(6));

        assert_eq!(
            state.cursor(),
            Some(WordCursor {
                word_index: 1,
                char_start: 6,
                char_end: 11
            })
        );
    }

    #[test]
    fn late_events_from_superseded_request_are_dropped() {
        let mut state = ReadingState::default();
        let first = speak(&mut state, "Hello world");
        engine(&mut state, first, EngineEvent::Start);
        engine(&mut state, first, word_boundary(0));

        let second = speak(&mut state, "Goodbye");
        assert_ne!(first, second);
        engine(&mut state, second, EngineEvent::Start);
        engine(&mut state, second, word_boundary(0));
        let live_cursor = state.cursor();

        engine(&mut state, first, word_boundary(6));
        engine(&mut state, first, EngineEvent::End);
        engine(
            &mut state,
            first,
            EngineEvent::Error(SpeechErrorKind::Other("late".into())),
        );

        assert_eq!(state.cursor(), live_cursor);
        assert_eq!(state.playback(), PlaybackState::Playing);
        assert_eq!(state.text(), Some("Goodbye"));
        assert_eq!(state.last_error(), None);
    }

    #[test]
    fn pause_and_resume_keep_cursor() {
        let mut state = ReadingState::default();
        let generation = speak(&mut state, "one two three");
        engine(&mut state, generation, EngineEvent::Start);
        engine(&mut state, generation, word_boundary(4));
        let before = state.cursor();

        assert_eq!(
            transition(&mut state, ReadingEvent::Pause),
            vec![ReadingAction::PauseUtterance]
        );
        assert_eq!(state.playback(), PlaybackState::Paused);
        engine(&mut state, generation, EngineEvent::Pause);
        assert_eq!(
            transition(&mut state, ReadingEvent::Resume),
            vec![ReadingAction::ResumeUtterance]
        );
        engine(&mut state, generation, EngineEvent::Resume);

        assert_eq!(state.playback(), PlaybackState::Playing);
        assert_eq!(state.cursor(), before);
    }

    #[test]
    fn pause_and_resume_are_noops_in_wrong_state() {
        let mut state = ReadingState::default();
        assert!(transition(&mut state, ReadingEvent::Pause).is_empty());
        assert!(transition(&mut state, ReadingEvent::Resume).is_empty());

        let generation = speak(&mut state, "one two");
        engine(&mut state, generation, EngineEvent::Start);
        assert!(transition(&mut state, ReadingEvent::Resume).is_empty());
        assert_eq!(state.playback(), PlaybackState::Playing);
    }

    #[test]
    fn stop_is_idempotent_from_every_state() {
        let mut idle = ReadingState::default();
        transition(&mut idle, ReadingEvent::Stop);
        transition(&mut idle, ReadingEvent::Stop);
        assert_eq!(idle.playback(), PlaybackState::Idle);
        assert_eq!(idle.cursor(), None);

        let mut playing = ReadingState::default();
        let generation = speak(&mut playing, "one two");
        engine(&mut playing, generation, EngineEvent::Start);
        engine(&mut playing, generation, word_boundary(0));
        transition(&mut playing, ReadingEvent::Stop);
        assert_eq!(playing.playback(), PlaybackState::Idle);
        assert_eq!(playing.cursor(), None);

        let mut paused = ReadingState::default();
        let generation = speak(&mut paused, "one two");
        engine(&mut paused, generation, EngineEvent::Start);
        transition(&mut paused, ReadingEvent::Pause);
        transition(&mut paused, ReadingEvent::Stop);
        assert_eq!(paused.playback(), PlaybackState::Idle);
        assert_eq!(paused.cursor(), None);

        engine(&mut paused, generation, word_boundary(4));
        assert_eq!(paused.cursor(), None);
    }

    #[test]
    fn end_clears_text_and_cursor() {
        let mut state = ReadingState::default();
        let generation = speak(&mut state, "one two");
        engine(&mut state, generation, EngineEvent::Start);
        engine(&mut state, generation, word_boundary(4));
        engine(&mut state, generation, EngineEvent::End);

        assert_eq!(state.playback(), PlaybackState::Idle);
        assert_eq!(state.cursor(), None);
        assert_eq!(state.text(), None);
    }

    #[test]
    fn interrupted_is_silent_but_other_errors_surface() {
        let mut state = ReadingState::default();
        let generation = speak(&mut state, "one two");
        engine(&mut state, generation, EngineEvent::Start);
        let actions = engine(
            &mut state,
            generation,
            EngineEvent::Error(SpeechErrorKind::Interrupted),
        );
        assert!(actions.is_empty());
        assert_eq!(state.playback(), PlaybackState::Idle);
        assert_eq!(state.last_error(), None);

        let generation = speak(&mut state, "three four");
        engine(&mut state, generation, EngineEvent::Start);
        let actions = engine(
            &mut state,
            generation,
            EngineEvent::Error(SpeechErrorKind::Other("synthesis-failed".into())),
        );
        assert_eq!(
            actions,
            vec![ReadingAction::SurfaceError("synthesis-failed".into())]
        );
        assert_eq!(state.playback(), PlaybackState::Idle);
        assert_eq!(state.text(), None);
        assert_eq!(state.last_error(), Some("synthesis-failed"));
    }

    #[test]
    fn out_of_range_boundary_keeps_cursor() {
        let mut state = ReadingState::default();
        let generation = speak(&mut state, "one two");
        engine(&mut state, generation, EngineEvent::Start);
        engine(&mut state, generation, word_boundary(4));
        let before = state.cursor();
        engine(&mut state, generation, word_boundary(99));
        assert_eq!(state.cursor(), before);
    }

    #[test]
    fn highlight_matches_spoken_text_or_enclosing_document() {
        let mut state = ReadingState::default();
        let excerpt = "brave  new world";
        let generation = speak(&mut state, excerpt);
        engine(&mut state, generation, EngineEvent::Start);
        engine(&mut state, generation, word_boundary(6));

        let span = state.highlight_span(excerpt).unwrap();
        assert_eq!((span.word_index, span.start, span.end), (1, 7, 10));
        assert_eq!(&excerpt[span.byte_range(excerpt).unwrap()], "new");

        let document = "Hello, brave  new world!";
        assert_eq!(state.highlight_span(document), None);
        let span = state.highlight_span_at(document, 7).unwrap();
        assert_eq!((span.start, span.end), (14, 17));
        assert_eq!(&document[span.byte_range(document).unwrap()], "new");

        assert_eq!(state.highlight_span_at(document, 3), None);
        assert_eq!(state.highlight_span_at(document, 500), None);
        assert_eq!(state.highlight_span("A different page entirely"), None);
    }

    #[test]
    fn repeated_excerpt_highlights_the_copy_being_read() {
        let mut state = ReadingState::default();
        let document = "Go now. Stop here. Go now.";
        let generation = speak(&mut state, "Go now.");
        engine(&mut state, generation, EngineEvent::Start);
        engine(&mut state, generation, word_boundary(0));

        let span = state.highlight_span_at(document, 19).unwrap();
        assert_eq!((span.start, span.end), (19, 21));
        let span = state.highlight_span_at(document, 0).unwrap();
        assert_eq!((span.start, span.end), (0, 2));
        assert_eq!(state.highlight_span_at(document, 8), None);
    }

    #[test]
    fn no_highlight_when_idle() {
        let mut state = ReadingState::default();
        let generation = speak(&mut state, "one two");
        assert_eq!(state.highlight_span("one two"), None);
        engine(&mut state, generation, EngineEvent::Start);
        engine(&mut state, generation, word_boundary(0));
        assert!(state.highlight_span("one two").is_some());
        transition(&mut state, ReadingEvent::Pause);
        assert!(state.highlight_span("one two").is_some());
        transition(&mut state, ReadingEvent::Stop);
        assert_eq!(state.highlight_span("one two"), None);
    }

    #[test]
    fn byte_range_handles_multibyte_text() {
        let span = HighlightSpan {
            word_index: 1,
            start: 5,
            end: 8,
        };
        let text = "café olé";
        assert_eq!(&text[span.byte_range(text).unwrap()], "olé");
        let past_end = HighlightSpan {
            word_index: 0,
            start: 7,
            end: 12,
        };
        assert_eq!(past_end.byte_range(text), None);
    }
}
