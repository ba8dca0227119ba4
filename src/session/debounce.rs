use std::time::Duration;
use tokio::time::Instant;

/// A resettable quiescence timer. Arming it again pushes the deadline out by the full window, so a
/// burst of mutations yields a single expiry. The owner polls the deadline; nothing runs on its own.
///
/// `pending` records that the deadline passed while a write was still running, so exactly one more
/// write is owed once that write completes.
#[derive(Debug, Clone)]
pub(crate) struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
    pending: bool,
}

impl Debounce {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            pending: false,
        }
    }

    pub(crate) fn window(&self) -> Duration {
        self.window
    }

    /// Sets the deadline to now plus the window, replacing any earlier deadline.
    pub(crate) fn arm(&mut self) -> Instant {
        let deadline = Instant::now() + self.window;
        self.deadline = Some(deadline);
        deadline
    }

    /// Drops the deadline and any owed write.
    pub(crate) fn cancel(&mut self) {
        self.deadline = None;
        self.pending = false;
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Called when the deadline has been reached.
    pub(crate) fn expire(&mut self) {
        self.deadline = None;
    }

    pub(crate) fn mark_pending(&mut self) {
        self.pending = true;
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending
    }

    /// Returns whether a write was owed and clears the flag.
    pub(crate) fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    /// Nothing is scheduled and nothing is owed.
    pub(crate) fn is_idle(&self) -> bool {
        self.deadline.is_none() && !self.pending
    }
}
