//! Process-wide count of transfers between `start` and their end.
//!
//! The exit guard asks [`InProgressCounter::any_active`] before letting the
//! user quit. Each controller contributes through its own [`Registration`],
//! which counts at most once and uncounts at most once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use tracing::trace;

static SHARED: LazyLock<Arc<InProgressCounter>> =
    LazyLock::new(|| Arc::new(InProgressCounter::new()));

/// Number of transfers currently in progress.
#[derive(Debug, Default)]
pub struct InProgressCounter {
    active: AtomicUsize,
}

impl InProgressCounter {
    pub const fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
        }
    }

    /// The counter shared by the whole process.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    pub fn count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn any_active(&self) -> bool {
        self.count() > 0
    }

    fn increment(&self) {
        self.active.fetch_add(1, Ordering::AcqRel);
    }

    /// Never goes below zero.
    fn decrement(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// One transfer's contribution to an [`InProgressCounter`].
///
/// Released automatically on drop.
#[derive(Debug)]
pub struct Registration {
    counter: Arc<InProgressCounter>,
    registered: bool,
}

impl Registration {
    pub fn new(counter: Arc<InProgressCounter>) -> Self {
        Self {
            counter,
            registered: false,
        }
    }

    /// Counts the transfer. Returns `false` if it was already counted.
    pub fn register(&mut self) -> bool {
        if self.registered {
            return false;
        }
        self.registered = true;
        self.counter.increment();
        trace!(active = self.counter.count(), "transfer registered");
        true
    }

    /// Uncounts the transfer. Returns `false` if it was not counted.
    pub fn release(&mut self) -> bool {
        if !self.registered {
            return false;
        }
        self.registered = false;
        self.counter.decrement();
        trace!(active = self.counter.count(), "transfer released");
        true
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}
