//! Pending-request accounting
//!
//! Counts request arrivals and completions and lets the check-and-collect
//! activity park until every admitted request has finished. Counts are
//! epoch-scoped: `reset` opens a new epoch after a completed collection.

use std::sync::Mutex;

use tokio::sync::Notify;

/// Arrival/completion counter with an asynchronous quiescence latch.
pub struct PendingWaiter {
    counts: Mutex<Counts>,
    quiesced: Notify,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    arrived: u64,
    finished: u64,
}

impl PendingWaiter {
    /// Create a waiter with no outstanding work.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(Counts::default()),
            quiesced: Notify::new(),
        }
    }

    /// Record one arrival. Must precede the upstream call it admits.
    pub fn request_arrived(&self) {
        let mut counts = self.counts.lock().expect("waiter counts poisoned");
        counts.arrived += 1;
    }

    /// Record one completion and return the finished total for this epoch.
    ///
    /// Must be called exactly once per arrival, also when the proxied call
    /// fails.
    pub fn request_finished(&self) -> u64 {
        let mut counts = self.counts.lock().expect("waiter counts poisoned");
        counts.finished += 1;
        debug_assert!(
            counts.finished <= counts.arrived,
            "completion without matching arrival"
        );
        if counts.arrived == counts.finished {
            self.quiesced.notify_waiters();
        }
        counts.finished
    }

    /// Finished total for this epoch.
    #[must_use]
    pub fn finished_count(&self) -> u64 {
        self.counts.lock().expect("waiter counts poisoned").finished
    }

    /// Park until every arrival has a matching completion; returns the
    /// finished count at release.
    pub async fn wait_pending(&self) -> u64 {
        loop {
            let notified = self.quiesced.notified();
            tokio::pin!(notified);
            // Register interest before inspecting the counts so a completion
            // between the check and the await cannot be lost.
            notified.as_mut().enable();
            {
                let counts = self.counts.lock().expect("waiter counts poisoned");
                if counts.arrived == counts.finished {
                    return counts.finished;
                }
            }
            notified.await;
        }
    }

    /// Open a new epoch. Callers must ensure quiescence first.
    pub fn reset(&self) {
        let mut counts = self.counts.lock().expect("waiter counts poisoned");
        counts.arrived = 0;
        counts.finished = 0;
    }
}

impl Default for PendingWaiter {
    fn default() -> Self {
        Self::new()
    }
}
