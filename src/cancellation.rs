//! Cooperative cancellation for work that runs off the event loop.
//!
//! Conversion attempts hand a clone of the token to the worker thread; the
//! runner cancels it when the job is removed or cleared so the converter can
//! stop early and kill any child process it owns.

use anyhow::{Result, anyhow};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token cancelled. Returns `true` only for the call that
    /// actually flipped it.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(anyhow!("conversion cancelled at stage={stage}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationToken;

    #[test]
    fn clones_observe_cancellation() {
        let token = CancellationToken::new();
        let worker_side = token.clone();
        assert!(worker_side.check_cancelled("spawn").is_ok());

        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(worker_side.is_cancelled());
        assert!(worker_side.check_cancelled("progress").is_err());
    }
}
