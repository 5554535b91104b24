//! Adaptive sampling interval
//!
//! Tracks how many finished requests should elapse between heap checks. The
//! interval follows the smallest finished-count observed over a short
//! history, clamped to a fixed band: a single load peak cannot stretch the
//! cadence, and idle phases cannot shrink it below the default.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

/// Number of past cycles consulted for the interval.
const SAMPLE_HISTORY_SIZE: usize = 5;
/// Lower clamp for the interval; also the cadence of a fresh proxy.
pub const DEFAULT_SAMPLE_SIZE: u64 = 128;
/// Upper clamp for the interval.
pub const MAX_SAMPLE_SIZE: u64 = 1024;

/// Rolling minimum over recent finished-request counts, exposed as the
/// current sampling interval.
///
/// `size` is read on every served request; only the check-and-collect
/// activity calls `update`.
pub struct SampleWindow {
    history: Mutex<History>,
    num_req: AtomicU64,
}

struct History {
    slots: [u64; SAMPLE_HISTORY_SIZE],
    index: usize,
}

impl SampleWindow {
    /// Create a window reporting the default interval.
    #[must_use]
    pub fn new() -> Self {
        let window = Self {
            history: Mutex::new(History {
                slots: [u64::MAX; SAMPLE_HISTORY_SIZE],
                index: 0,
            }),
            num_req: AtomicU64::new(DEFAULT_SAMPLE_SIZE),
        };
        window.update(DEFAULT_SAMPLE_SIZE);
        window
    }

    /// Current sampling interval. Safe to call concurrently with `update`.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.num_req.load(Ordering::Acquire)
    }

    /// Record the finished count of a completed cycle and recompute the
    /// interval as the clamped minimum over the history.
    pub fn update(&self, finished: u64) {
        let mut history = self.history.lock().expect("sample window history poisoned");
        history.index = (history.index + 1) % SAMPLE_HISTORY_SIZE;
        let index = history.index;
        history.slots[index] = finished;
        let smallest = history.slots.iter().copied().min().unwrap_or(u64::MAX);
        self.num_req.store(
            smallest.clamp(DEFAULT_SAMPLE_SIZE, MAX_SAMPLE_SIZE),
            Ordering::Release,
        );
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new()
    }
}
