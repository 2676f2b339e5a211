//! Background music playlist.
//!
//! Tracks are opened with `rodio::Decoder` when added and get a bookkeeping
//! entry in the playlist's resource registry until removed. The decoder feeding
//! the sink is reopened on each play. Audio output is detected once;
//! without it the playlist still tracks state so the panel stays usable.

use crate::resources::{Resource, ResourceId, ResourceRegistry};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct TrackId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("failed to open {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported audio file {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },
    #[error("audio output failed: {0}")]
    Output(String),
}

#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub path: PathBuf,
    pub title: String,
    pub duration: Option<Duration>,
    resource: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub title: String,
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct PlaylistSnapshot {
    pub tracks: Vec<TrackSnapshot>,
    pub current: Option<TrackId>,
    pub state: PlayerState,
    pub volume: f32,
    pub audio_available: bool,
}

struct AudioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
}

pub struct Playlist {
    tracks: Vec<Track>,
    current: Option<usize>,
    state: PlayerState,
    volume: f32,
    next_id: u64,
    resources: ResourceRegistry,
    output: Option<AudioOutput>,
}

impl Playlist {
    /// Playlist without audio output; playback only changes state.
    pub fn new(volume: f32) -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
            state: PlayerState::Stopped,
            volume: clamp_volume(volume, 1.0),
            next_id: 0,
            resources: ResourceRegistry::new(),
            output: None,
        }
    }

    /// Look for the default audio device once.
    pub fn detect(volume: f32) -> Self {
        let mut playlist = Self::new(volume);
        match OutputStream::try_default() {
            Ok((stream, handle)) => {
                info!("Audio output available for music playback");
                playlist.output = Some(AudioOutput {
                    _stream: stream,
                    handle,
                    sink: None,
                });
            }
            Err(err) => info!("No audio output; music player runs silently: {err}"),
        }
        playlist
    }

    pub fn has_audio_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|idx| self.tracks.get(idx))
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn live_handles(&self) -> usize {
        self.resources.live_count()
    }

    pub fn add_track(&mut self, path: &Path) -> Result<TrackId, PlaylistError> {
        let duration = open_decoder(path)?.total_duration();
        self.next_id += 1;
        let id = TrackId(self.next_id);
        let resource = self.resources.acquire(Resource::AudioTrack {
            path: path.to_path_buf(),
        });
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("Track {}", id.0));
        info!(track = id.0, %title, duration_ms = ?duration.map(|d| d.as_millis()), "Added track");
        self.tracks.push(Track {
            id,
            path: path.to_path_buf(),
            title,
            duration,
            resource,
        });
        if self.current.is_none() {
            self.current = Some(0);
        }
        Ok(id)
    }

    /// Returns `false` when the track is unknown or already removed.
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        let Some(idx) = self.tracks.iter().position(|track| track.id == id) else {
            return false;
        };
        let track = self.tracks.remove(idx);
        self.resources.release(track.resource);

        match self.current {
            Some(current) if current == idx => {
                self.stop();
                self.current = if self.tracks.is_empty() {
                    None
                } else {
                    Some(idx.min(self.tracks.len() - 1))
                };
            }
            Some(current) if current > idx => self.current = Some(current - 1),
            _ => {}
        }
        debug!(track = id.0, remaining = self.tracks.len(), "Removed track");
        true
    }

    pub fn clear(&mut self) -> usize {
        self.stop();
        self.current = None;
        let released = self
            .tracks
            .drain(..)
            .filter(|track| self.resources.release(track.resource))
            .count();
        debug!(released, "Cleared playlist");
        released
    }

    pub fn play(&mut self) -> Result<(), PlaylistError> {
        match self.state {
            PlayerState::Playing => Ok(()),
            PlayerState::Paused => {
                if let Some(sink) = self.output.as_ref().and_then(|o| o.sink.as_ref()) {
                    sink.play();
                }
                self.state = PlayerState::Playing;
                Ok(())
            }
            PlayerState::Stopped => {
                let Some(track) = self.current() else {
                    debug!("Play ignored; playlist empty");
                    return Ok(());
                };
                let path = track.path.clone();
                self.start_sink(&path)?;
                self.state = PlayerState::Playing;
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        if let Some(sink) = self.output.as_ref().and_then(|o| o.sink.as_ref()) {
            sink.pause();
        }
        self.state = PlayerState::Paused;
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.output.as_mut().and_then(|o| o.sink.take()) {
            sink.stop();
        }
        self.state = PlayerState::Stopped;
    }

    pub fn next(&mut self) -> Result<(), PlaylistError> {
        self.step(1)
    }

    pub fn previous(&mut self) -> Result<(), PlaylistError> {
        self.step(-1)
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume, self.volume);
        if let Some(sink) = self.output.as_ref().and_then(|o| o.sink.as_ref()) {
            sink.set_volume(self.volume);
        }
    }

    /// Stop playback and release every track handle.
    pub fn teardown(&mut self) {
        self.clear();
        self.output = None;
    }

    pub fn snapshot(&self) -> PlaylistSnapshot {
        PlaylistSnapshot {
            tracks: self
                .tracks
                .iter()
                .map(|track| TrackSnapshot {
                    id: track.id,
                    title: track.title.clone(),
                    duration_secs: track.duration.map(|d| d.as_secs()),
                })
                .collect(),
            current: self.current().map(|track| track.id),
            state: self.state,
            volume: self.volume,
            audio_available: self.has_audio_output(),
        }
    }

    fn step(&mut self, delta: isize) -> Result<(), PlaylistError> {
        let len = self.tracks.len();
        let Some(current) = self.current else {
            return Ok(());
        };
        let next = (current as isize + delta).rem_euclid(len as isize) as usize;
        self.current = Some(next);
        if self.state == PlayerState::Stopped {
            return Ok(());
        }
        self.stop();
        self.play()
    }

    fn start_sink(&mut self, path: &Path) -> Result<(), PlaylistError> {
        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };
        let decoder = open_decoder(path)?;
        let sink = Sink::try_new(&output.handle).map_err(|err| {
            warn!("Failed to create audio sink: {err}");
            PlaylistError::Output(err.to_string())
        })?;
        sink.set_volume(self.volume);
        sink.append(decoder);
        sink.play();
        output.sink = Some(sink);
        Ok(())
    }
}

impl Drop for Playlist {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, PlaylistError> {
    let file = File::open(path).map_err(|source| PlaylistError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Decoder::new(BufReader::new(file)).map_err(|err| PlaylistError::Decode {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn clamp_volume(volume: f32, fallback: f32) -> f32 {
    if volume.is_nan() {
        fallback
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tone(dir: &Path, name: &str, seconds: u32) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..(8_000 * seconds) {
            let sample = ((i as f32 * 0.05).sin() * 1_000.0) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn playlist_with(count: usize) -> (tempfile::TempDir, Playlist, Vec<TrackId>) {
        let dir = tempfile::tempdir().unwrap();
        let mut playlist = Playlist::new(0.8);
        let ids = (0..count)
            .map(|i| {
                let path = write_tone(dir.path(), &format!("track{i}.wav"), 1);
                playlist.add_track(&path).unwrap()
            })
            .collect();
        (dir, playlist, ids)
    }

    #[test]
    fn add_track_reads_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "calm.wav", 2);
        let mut playlist = Playlist::new(1.0);
        let id = playlist.add_track(&path).unwrap();

        let track = playlist.current().unwrap();
        assert_eq!(track.id, id);
        assert_eq!(track.title, "calm");
        assert_eq!(track.duration.map(|d| d.as_secs()), Some(2));
        assert_eq!(playlist.live_handles(), 1);
    }

    #[test]
    fn unreadable_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("noise.mp3");
        std::fs::write(&bogus, b"definitely not audio").unwrap();
        let mut playlist = Playlist::new(1.0);

        assert!(matches!(
            playlist.add_track(&bogus),
            Err(PlaylistError::Decode { .. })
        ));
        assert!(matches!(
            playlist.add_track(&dir.path().join("missing.ogg")),
            Err(PlaylistError::Open { .. })
        ));
        assert!(playlist.tracks().is_empty());
        assert_eq!(playlist.live_handles(), 0);
    }

    #[test]
    fn remove_releases_handle_once() {
        let (_dir, mut playlist, ids) = playlist_with(2);
        assert!(playlist.remove_track(ids[0]));
        assert!(!playlist.remove_track(ids[0]));
        assert_eq!(playlist.live_handles(), 1);
        assert_eq!(playlist.current().map(|t| t.id), Some(ids[1]));
    }

    #[test]
    fn navigation_wraps_around() {
        let (_dir, mut playlist, ids) = playlist_with(3);
        playlist.previous().unwrap();
        assert_eq!(playlist.current().map(|t| t.id), Some(ids[2]));
        playlist.next().unwrap();
        assert_eq!(playlist.current().map(|t| t.id), Some(ids[0]));
        playlist.next().unwrap();
        assert_eq!(playlist.current().map(|t| t.id), Some(ids[1]));
    }

    #[test]
    fn playback_state_without_audio_output() {
        let (_dir, mut playlist, _ids) = playlist_with(2);
        assert!(!playlist.has_audio_output());
        playlist.pause();
        assert_eq!(playlist.state(), PlayerState::Stopped);
        playlist.play().unwrap();
        assert_eq!(playlist.state(), PlayerState::Playing);
        playlist.next().unwrap();
        assert_eq!(playlist.state(), PlayerState::Playing);
        playlist.pause();
        assert_eq!(playlist.state(), PlayerState::Paused);
        playlist.play().unwrap();
        assert_eq!(playlist.state(), PlayerState::Playing);
        playlist.stop();
        assert_eq!(playlist.state(), PlayerState::Stopped);
    }

    #[test]
    fn removing_current_track_stops_playback() {
        let (_dir, mut playlist, ids) = playlist_with(2);
        playlist.next().unwrap();
        playlist.play().unwrap();
        assert!(playlist.remove_track(ids[1]));
        assert_eq!(playlist.state(), PlayerState::Stopped);
        assert_eq!(playlist.current().map(|t| t.id), Some(ids[0]));
    }

    #[test]
    fn volume_is_clamped() {
        let mut playlist = Playlist::new(3.0);
        assert!((playlist.volume() - 1.0).abs() < f32::EPSILON);
        playlist.set_volume(-0.5);
        assert!(playlist.volume().abs() < f32::EPSILON);
        playlist.set_volume(f32::NAN);
        assert!(playlist.volume().abs() < f32::EPSILON);
        playlist.set_volume(0.4);
        assert!((playlist.volume() - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn clear_releases_every_handle() {
        let (_dir, mut playlist, _ids) = playlist_with(3);
        playlist.play().unwrap();
        assert_eq!(playlist.clear(), 3);
        assert_eq!(playlist.live_handles(), 0);
        assert!(playlist.current().is_none());
        assert_eq!(playlist.state(), PlayerState::Stopped);
        playlist.play().unwrap();
        assert_eq!(playlist.state(), PlayerState::Stopped);
    }
}
