//! Productivity widgets shown next to the reader.

pub mod playlist;
pub mod pomodoro;
pub mod timer;

pub use playlist::{Playlist, PlaylistError, TrackId};
pub use pomodoro::{PhaseChange, Pomodoro, PomodoroPhase, PomodoroSettings};
pub use timer::Timer;
