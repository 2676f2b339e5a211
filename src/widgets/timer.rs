//! Countdown timer driven by caller-supplied instants.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Timer {
    duration: Duration,
    remaining: Duration,
    running_since: Option<Instant>,
    expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct TimerSnapshot {
    pub total_secs: u64,
    pub remaining_secs: u64,
    pub running: bool,
}

impl Timer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            remaining: duration,
            running_since: None,
            expired: false,
        }
    }

    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(Duration::from_secs(u64::from(minutes) * 60))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn start(&mut self, now: Instant) {
        if self.is_running() || self.expired {
            return;
        }
        debug!(remaining_ms = self.remaining.as_millis() as u64, "Timer started");
        self.running_since = Some(now);
    }

    pub fn pause(&mut self, now: Instant) {
        if self.running_since.is_some() {
            self.remaining = self.remaining(now);
            self.running_since = None;
            debug!(remaining_ms = self.remaining.as_millis() as u64, "Timer paused");
        }
    }

    pub fn reset(&mut self) {
        self.remaining = self.duration;
        self.running_since = None;
        self.expired = false;
    }

    /// Change the length; the countdown restarts from the new duration.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
        self.reset();
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(since) => self
                .remaining
                .saturating_sub(now.saturating_duration_since(since)),
            None => self.remaining,
        }
    }

    /// Instant at which a running countdown reaches zero.
    pub fn deadline(&self) -> Option<Instant> {
        self.running_since.map(|since| since + self.remaining)
    }

    /// Returns true exactly once, on the tick that observes expiry.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.running_since.is_none() || !self.remaining(now).is_zero() {
            return false;
        }
        self.remaining = Duration::ZERO;
        self.running_since = None;
        self.expired = true;
        info!(total_secs = self.duration.as_secs(), "Timer finished");
        true
    }

    pub fn snapshot(&self, now: Instant) -> TimerSnapshot {
        TimerSnapshot {
            total_secs: self.duration.as_secs(),
            remaining_secs: self.remaining(now).as_secs(),
            running: self.is_running(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_and_fires_once() {
        let t0 = Instant::now();
        let mut timer = Timer::new(Duration::from_secs(10));
        timer.start(t0);
        assert_eq!(timer.remaining(t0 + Duration::from_secs(4)), Duration::from_secs(6));
        assert!(!timer.tick(t0 + Duration::from_secs(9)));
        assert!(timer.tick(t0 + Duration::from_secs(10)));
        assert!(!timer.tick(t0 + Duration::from_secs(11)));
        assert!(timer.is_expired());
        assert!(!timer.is_running());
    }

    #[test]
    fn pause_freezes_remaining_time() {
        let t0 = Instant::now();
        let mut timer = Timer::new(Duration::from_secs(60));
        timer.start(t0);
        assert_eq!(timer.deadline(), Some(t0 + Duration::from_secs(60)));
        timer.pause(t0 + Duration::from_secs(20));
        assert_eq!(timer.deadline(), None);
        assert_eq!(timer.remaining(t0 + Duration::from_secs(50)), Duration::from_secs(40));
        assert!(!timer.tick(t0 + Duration::from_secs(100)));

        timer.start(t0 + Duration::from_secs(100));
        assert_eq!(timer.deadline(), Some(t0 + Duration::from_secs(140)));
        assert!(timer.tick(t0 + Duration::from_secs(140)));
    }

    #[test]
    fn reset_restores_full_duration() {
        let t0 = Instant::now();
        let mut timer = Timer::from_minutes(1);
        timer.start(t0);
        timer.tick(t0 + Duration::from_secs(61));
        timer.start(t0 + Duration::from_secs(62));
        assert!(!timer.is_running());

        timer.reset();
        assert!(!timer.is_expired());
        let snapshot = timer.snapshot(t0);
        assert_eq!(snapshot.remaining_secs, 60);
        assert!(!snapshot.running);
    }
}
