use super::{SpeechPlatform, SpeechRequest, TaggedEvent, Voice};
use crate::coordinator::{HighlightSpan, ReadingAction, ReadingEvent, ReadingState, transition};
use tracing::{debug, info, warn};

/// Owns the platform handle and the reading state.
///
/// A missing platform is decided once at construction: every command then
/// becomes a logged no-op and [`is_available`](Self::is_available) stays false.
pub struct SpeechAdapter<P: SpeechPlatform> {
    platform: Option<P>,
    state: ReadingState,
}

impl<P: SpeechPlatform> SpeechAdapter<P> {
    pub fn new(platform: Option<P>) -> Self {
        if platform.is_none() {
            info!("Speech synthesis unavailable; read-aloud disabled");
        }
        Self {
            platform,
            state: ReadingState::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.platform.is_some()
    }

    pub fn state(&self) -> &ReadingState {
        &self.state
    }

    pub fn speak(&mut self, request: SpeechRequest) {
        if !self.is_available() {
            warn!("Speak requested without a speech platform");
            return;
        }
        self.dispatch(ReadingEvent::Speak(request));
    }

    pub fn pause(&mut self) {
        self.dispatch(ReadingEvent::Pause);
    }

    pub fn resume(&mut self) {
        self.dispatch(ReadingEvent::Resume);
    }

    pub fn stop(&mut self) {
        self.dispatch(ReadingEvent::Stop);
    }

    /// Drain pending platform events through the coordinator. Returns the
    /// error messages surfaced during this pump.
    pub fn pump(&mut self) -> Vec<String> {
        let events = match self.platform.as_mut() {
            Some(platform) => platform.poll_events(),
            None => return Vec::new(),
        };
        let mut surfaced = Vec::new();
        for event in events {
            surfaced.extend(self.deliver(event));
        }
        surfaced
    }

    /// Feed one engine event, as a platform callback would.
    pub fn deliver(&mut self, event: TaggedEvent) -> Vec<String> {
        self.dispatch(ReadingEvent::Engine(event))
    }

    pub fn highlight_span(&self, slice: &str) -> Option<HighlightSpan> {
        self.state.highlight_span(slice)
    }

    pub fn highlight_span_at(&self, slice: &str, origin: usize) -> Option<HighlightSpan> {
        self.state.highlight_span_at(slice, origin)
    }

    pub fn dismiss_error(&mut self) {
        self.state.dismiss_error();
    }

    pub fn voices(&self) -> Vec<Voice> {
        self.platform
            .as_ref()
            .map(SpeechPlatform::voices)
            .unwrap_or_default()
    }

    pub fn platform_mut(&mut self) -> Option<&mut P> {
        self.platform.as_mut()
    }

    fn dispatch(&mut self, event: ReadingEvent) -> Vec<String> {
        let actions = transition(&mut self.state, event);
        let mut surfaced = Vec::new();
        for action in actions {
            match action {
                ReadingAction::SurfaceError(message) => surfaced.push(message),
                other => self.run_platform_action(other),
            }
        }
        surfaced
    }

    fn run_platform_action(&mut self, action: ReadingAction) {
        let Some(platform) = self.platform.as_mut() else {
            debug!(?action, "Dropping platform action; no speech platform");
            return;
        };
        match action {
            ReadingAction::CancelUtterance => platform.cancel(),
            ReadingAction::SubmitUtterance {
                generation,
                request,
            } => platform.submit(generation, &request),
            ReadingAction::PauseUtterance => platform.pause(),
            ReadingAction::ResumeUtterance => platform.resume(),
            ReadingAction::SurfaceError(_) => {}
        }
    }
}
