use std::time::{Duration, Instant};

/// A single delayed call that the frame loop polls.
///
/// `schedule` throttles: while a call is pending, further requests are dropped
/// rather than queued. `restart` replaces a pending call instead.
#[derive(Debug, Clone)]
pub struct DeferredTask {
    delay: Duration,
    due: Option<Instant>,
}

impl DeferredTask {
    pub fn new(delay: Duration) -> Self {
        Self { delay, due: None }
    }

    /// Returns false if the request was dropped because one is already pending.
    pub fn schedule(&mut self, now: Instant) -> bool {
        if self.due.is_some() {
            return false;
        }
        self.due = Some(now + self.delay);
        true
    }

    pub fn restart(&mut self, now: Instant) {
        self.cancel();
        self.due = Some(now + self.delay);
    }

    /// Returns true if a pending call was cancelled.
    pub fn cancel(&mut self) -> bool {
        self.due.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// True exactly once, on the first poll at or after the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.due.map(|due| due.saturating_duration_since(now))
    }
}
