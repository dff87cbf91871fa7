//! Coalescing of forwarding recomputes.
//!
//! A burst of accepted merges marks one pending recompute. The background
//! runner waits out the coalescing window after the first mark and then
//! runs once, however many marks arrived in between.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Pending-recompute flag with a wakeup for the runner.
#[derive(Debug)]
pub struct RecomputeScheduler {
    pending: AtomicBool,
    notify: Notify,
    delay: Duration,
}

impl RecomputeScheduler {
    /// Create a scheduler with the given coalescing window.
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: AtomicBool::new(false),
            notify: Notify::new(),
            delay,
        }
    }

    /// The coalescing window.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Mark a recompute as pending.
    ///
    /// Returns true if this call opened a new window; later calls before
    /// the runner takes the mark are absorbed.
    ///
    /// Callers mark after the database lock is released. The recompute
    /// reads the database under its own lock acquisition, so it sees at
    /// least every change made before the mark.
    pub fn request(&self) -> bool {
        let opened = !self.pending.swap(true, Ordering::AcqRel);
        if opened {
            self.notify.notify_one();
        }
        opened
    }

    /// Take the pending mark, if any.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until a window opens, then until it closes.
    ///
    /// Returns whether the mark was still pending when the window closed;
    /// a flush in the meantime leaves nothing to do.
    pub async fn next_window(&self) -> bool {
        self.notify.notified().await;
        tokio::time::sleep(self.delay).await;
        self.take()
    }
}

impl Default for RecomputeScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
