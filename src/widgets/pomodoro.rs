//! Pomodoro cycle: focus phases separated by short breaks, with a long break
//! after every N focus phases.

use super::timer::Timer;
use crate::config::AppConfig;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PomodoroPhase {
    Focus,
    ShortBreak,
    LongBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PomodoroSettings {
    pub focus: Duration,
    pub short_break: Duration,
    pub long_break: Duration,
    pub cycles_before_long_break: u32,
}

impl PomodoroSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let minutes = |m: u32| Duration::from_secs(u64::from(m) * 60);
        Self {
            focus: minutes(config.pomodoro_focus_minutes),
            short_break: minutes(config.pomodoro_short_break_minutes),
            long_break: minutes(config.pomodoro_long_break_minutes),
            cycles_before_long_break: config.pomodoro_cycles_before_long_break.max(1),
        }
    }

    fn duration_of(&self, phase: PomodoroPhase) -> Duration {
        match phase {
            PomodoroPhase::Focus => self.focus,
            PomodoroPhase::ShortBreak => self.short_break,
            PomodoroPhase::LongBreak => self.long_break,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct PhaseChange {
    pub from: PomodoroPhase,
    pub to: PomodoroPhase,
    pub completed_focus: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct PomodoroSnapshot {
    pub phase: PomodoroPhase,
    pub completed_focus: u32,
    pub remaining_secs: u64,
    pub running: bool,
}

#[derive(Debug, Clone)]
pub struct Pomodoro {
    settings: PomodoroSettings,
    phase: PomodoroPhase,
    completed_focus: u32,
    timer: Timer,
}

impl Pomodoro {
    pub fn new(settings: PomodoroSettings) -> Self {
        Self {
            timer: Timer::new(settings.focus),
            settings,
            phase: PomodoroPhase::Focus,
            completed_focus: 0,
        }
    }

    pub fn phase(&self) -> PomodoroPhase {
        self.phase
    }

    pub fn completed_focus(&self) -> u32 {
        self.completed_focus
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.timer.remaining(now)
    }

    pub fn start(&mut self, now: Instant) {
        self.timer.start(now);
    }

    pub fn pause(&mut self, now: Instant) {
        self.timer.pause(now);
    }

    pub fn reset(&mut self) {
        self.phase = PomodoroPhase::Focus;
        self.completed_focus = 0;
        self.timer = Timer::new(self.settings.focus);
    }

    /// End the current phase early. Skipping a focus phase does not count it
    /// as completed.
    pub fn skip(&mut self, now: Instant) -> PhaseChange {
        let was_running = self.timer.is_running();
        let next = match self.phase {
            PomodoroPhase::Focus => self.break_after(self.completed_focus + 1),
            _ => PomodoroPhase::Focus,
        };
        self.enter(next, was_running, now)
    }

    /// Advance on expiry. The next phase is timed from the moment the
    /// previous one ran out, so late ticks do not stretch the cycle.
    pub fn tick(&mut self, now: Instant) -> Option<PhaseChange> {
        let deadline = self.timer.deadline();
        if !self.timer.tick(now) {
            return None;
        }
        let next = match self.phase {
            PomodoroPhase::Focus => {
                self.completed_focus += 1;
                self.break_after(self.completed_focus)
            }
            _ => PomodoroPhase::Focus,
        };
        Some(self.enter(next, true, deadline.unwrap_or(now)))
    }

    pub fn snapshot(&self, now: Instant) -> PomodoroSnapshot {
        PomodoroSnapshot {
            phase: self.phase,
            completed_focus: self.completed_focus,
            remaining_secs: self.timer.remaining(now).as_secs(),
            running: self.timer.is_running(),
        }
    }

    fn break_after(&self, focus_count: u32) -> PomodoroPhase {
        if focus_count % self.settings.cycles_before_long_break == 0 {
            PomodoroPhase::LongBreak
        } else {
            PomodoroPhase::ShortBreak
        }
    }

    fn enter(&mut self, next: PomodoroPhase, run: bool, now: Instant) -> PhaseChange {
        let change = PhaseChange {
            from: self.phase,
            to: next,
            completed_focus: self.completed_focus,
        };
        self.phase = next;
        self.timer = Timer::new(self.settings.duration_of(next));
        if run {
            self.timer.start(now);
        }
        info!(from = ?change.from, to = ?change.to, completed = change.completed_focus, "Pomodoro phase changed");
        change
    }
}
