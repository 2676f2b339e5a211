//! The reader session: one owned context for everything the UI shares.
//!
//! Speech state, conversion jobs, the music playlist and the timers all live
//! here and are driven from a single loop through [`ReaderSession::tick`].
//! [`ReaderSession::teardown`] releases every external resource; it also runs
//! on drop.

use crate::config::{AppConfig, HighlightColor};
use crate::conversion::ebook_convert::EbookConvert;
use crate::conversion::{ConversionRunner, Converter, JobSnapshot};
use crate::coordinator::HighlightSpan;
use crate::document::{DocumentError, DocumentFormat, DocumentLoader, DocumentText};
use crate::search::{self, SearchHit};
use crate::speech::paced::PacedPlatform;
use crate::speech::{PlaybackState, SpeechAdapter, SpeechRequest};
use crate::tracker::WordCursor;
use crate::widgets::playlist::PlaylistSnapshot;
use crate::widgets::pomodoro::PomodoroSnapshot;
use crate::widgets::timer::TimerSnapshot;
use crate::widgets::{PhaseChange, Playlist, Pomodoro, PomodoroSettings, Timer};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What happened during one [`ReaderSession::tick`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub speech_errors: Vec<String>,
    pub conversion_updates: usize,
    pub timer_expired: bool,
    pub phase_change: Option<PhaseChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct DocumentSummary {
    pub title: String,
    pub format: DocumentFormat,
    pub page_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct SessionSnapshot {
    pub speech_available: bool,
    pub playback: PlaybackState,
    pub cursor: Option<WordCursor>,
    pub highlight: Option<HighlightSpan>,
    pub highlight_color: HighlightColor,
    pub last_error: Option<String>,
    pub document: Option<DocumentSummary>,
    pub jobs: Vec<JobSnapshot>,
    pub timer: TimerSnapshot,
    pub pomodoro: PomodoroSnapshot,
    pub playlist: PlaylistSnapshot,
}

pub struct ReaderSession<C: Converter = EbookConvert> {
    config: AppConfig,
    loader: DocumentLoader,
    document: Option<DocumentText>,
    /// Char offset in the document where the current read-aloud text starts.
    reading_origin: usize,
    speech: SpeechAdapter<PacedPlatform>,
    conversions: ConversionRunner<C>,
    playlist: Playlist,
    timer: Timer,
    pomodoro: Pomodoro,
    torn_down: bool,
}

impl ReaderSession<EbookConvert> {
    /// Session wired to the real collaborators named in `config`.
    pub fn new(config: AppConfig) -> Self {
        let speech = SpeechAdapter::new(Some(PacedPlatform::new(config.words_per_minute)));
        let converter = EbookConvert::new(config.ebook_convert_bin.clone());
        let playlist = Playlist::detect(config.music_volume);
        Self::with_parts(config, speech, converter, playlist)
    }
}

impl<C: Converter> ReaderSession<C> {
    pub fn with_parts(
        config: AppConfig,
        speech: SpeechAdapter<PacedPlatform>,
        converter: C,
        playlist: Playlist,
    ) -> Self {
        info!(
            speech = speech.is_available(),
            audio = playlist.has_audio_output(),
            output_dir = %config.conversion_output_dir,
            "Reader session ready"
        );
        Self {
            loader: DocumentLoader::new(config.pdftotext_bin.clone(), config.chars_per_page),
            document: None,
            reading_origin: 0,
            conversions: ConversionRunner::new(converter, &config.conversion_output_dir),
            timer: Timer::from_minutes(config.timer_minutes),
            pomodoro: Pomodoro::new(PomodoroSettings::from_config(&config)),
            speech,
            playlist,
            config,
            torn_down: false,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&DocumentText> {
        self.document.as_ref()
    }

    pub fn speech(&self) -> &SpeechAdapter<PacedPlatform> {
        &self.speech
    }

    pub fn conversions(&self) -> &ConversionRunner<C> {
        &self.conversions
    }

    pub fn conversions_mut(&mut self) -> &mut ConversionRunner<C> {
        &mut self.conversions
    }

    pub fn playlist_mut(&mut self) -> &mut Playlist {
        &mut self.playlist
    }

    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub fn pomodoro_mut(&mut self) -> &mut Pomodoro {
        &mut self.pomodoro
    }

    /// Replace the open document. Any ongoing read-aloud is stopped first.
    pub fn open_document(&mut self, path: &Path) -> Result<&DocumentText, DocumentError> {
        self.speech.stop();
        self.reading_origin = 0;
        let document = self.loader.load(path)?;
        Ok(self.document.insert(document))
    }

    /// Read the whole document, or the chars in `excerpt` when given.
    /// Returns whether an utterance was submitted.
    pub fn read_aloud(&mut self, excerpt: Option<(usize, usize)>) -> bool {
        let Some(document) = self.document.as_ref() else {
            warn!("Read-aloud requested without an open document");
            return false;
        };
        let (origin, text) = match excerpt {
            Some((start, end)) => (
                start,
                document
                    .text
                    .chars()
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .collect::<String>(),
            ),
            None => (0, document.text.clone()),
        };
        if text.trim().is_empty() || !self.speech.is_available() {
            debug!(?excerpt, "Nothing to read aloud");
            return false;
        }
        let request = SpeechRequest::new(text)
            .with_rate(self.config.speech_rate)
            .with_pitch(self.config.speech_pitch)
            .with_volume(self.config.speech_volume)
            .with_voice(self.config.speech_voice_id.clone());
        self.speech.speak(request);
        self.reading_origin = origin;
        true
    }

    pub fn pause_reading(&mut self) {
        self.speech.pause();
    }

    pub fn resume_reading(&mut self) {
        self.speech.resume();
    }

    pub fn stop_reading(&mut self) {
        self.speech.stop();
    }

    /// Word to highlight in the open document's text.
    pub fn highlight(&self) -> Option<HighlightSpan> {
        let document = self.document.as_ref()?;
        self.speech
            .highlight_span_at(&document.text, self.reading_origin)
    }

    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        match self.document.as_ref() {
            Some(document) => search::search(&document.text, query, document.page_count),
            None => Vec::new(),
        }
    }

    /// Advance every clock-driven part of the session to `now`.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        if let Some(platform) = self.speech.platform_mut() {
            platform.tick(now);
        }
        TickReport {
            speech_errors: self.speech.pump(),
            conversion_updates: self.conversions.pump(),
            timer_expired: self.timer.tick(now),
            phase_change: self.pomodoro.tick(now),
        }
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        let state = self.speech.state();
        SessionSnapshot {
            speech_available: self.speech.is_available(),
            playback: state.playback(),
            cursor: state.cursor(),
            highlight: self.highlight(),
            highlight_color: self.config.highlight,
            last_error: state.last_error().map(str::to_string),
            document: self.document.as_ref().map(|doc| DocumentSummary {
                title: doc.title.clone(),
                format: doc.format,
                page_count: doc.page_count,
            }),
            jobs: self
                .conversions
                .jobs()
                .iter()
                .map(|job| job.snapshot(self.conversions.artifact_path(job.id())))
                .collect(),
            timer: self.timer.snapshot(now),
            pomodoro: self.pomodoro.snapshot(now),
            playlist: self.playlist.snapshot(),
        }
    }

    /// Stop speech and release every conversion artifact and track handle.
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.speech.stop();
        let jobs = self.conversions.clear_all();
        self.playlist.teardown();
        info!(jobs, "Reader session torn down");
    }
}

impl<C: Converter> Drop for ReaderSession<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}
