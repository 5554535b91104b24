//! Control engine
//!
//! Coordinates the serving path with the out-of-band collection protocol.
//! The engine admits or sheds requests, counts completions, and every
//! sampling interval spawns a single check-and-collect activity: ask the
//! agent for heap usage, compare against the shedding threshold, and when
//! usage is high make the proxy unavailable, drain in-flight requests to
//! quiescence, trigger the collection, and resume.
//!
//! Guards:
//! - `available == false` sheds new requests with `503`.
//! - `checking == true` means one activity is live; never two.
//! - The availability check and the arrival count happen under one mutex
//!   acquisition, so a request is either counted and drained or shed.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use tracing::{debug, warn};

use crate::{
    agent::AgentClient,
    error::Result,
    metrics::ProxyMetrics,
    threshold::SheddingThreshold,
    waiter::PendingWaiter,
    window::SampleWindow,
};

/// Admission decision for one incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Admitted; the caller must report completion via
    /// [`ControlEngine::complete`] after the upstream call, also on failure.
    Served,
    /// The engine is draining toward a collection; answer `503` without
    /// contacting the upstream.
    Shed,
    /// Interception is disabled; forward without bookkeeping.
    Bypass,
}

/// Construction parameters for [`ControlEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Size of the backend's young generation in bytes; derives the
    /// shedding-threshold band.
    pub gen_size: i64,
    /// Seed for the threshold's pseudo-random walk.
    pub seed: u64,
    /// Emit one CSV diagnostic line per cycle on stdout.
    pub print_gc: bool,
    /// When false the engine is a pure pass-through and never issues
    /// control calls.
    pub enabled: bool,
}

struct EngineState {
    available: bool,
    checking: bool,
    cumulative_finished: u64,
}

/// State machine coordinating serve, shed, drain, check and collect.
pub struct ControlEngine {
    state: Mutex<EngineState>,
    waiter: PendingWaiter,
    window: SampleWindow,
    threshold: Mutex<SheddingThreshold>,
    agent: AgentClient,
    metrics: Arc<ProxyMetrics>,
    print_gc: bool,
    enabled: bool,
}

impl ControlEngine {
    /// Create an engine in the serving state.
    #[must_use]
    pub fn new(agent: AgentClient, options: &EngineOptions, metrics: Arc<ProxyMetrics>) -> Self {
        Self {
            state: Mutex::new(EngineState {
                available: true,
                checking: false,
                cumulative_finished: 0,
            }),
            waiter: PendingWaiter::new(),
            window: SampleWindow::new(),
            threshold: Mutex::new(SheddingThreshold::new(options.seed, options.gen_size)),
            agent,
            metrics,
            print_gc: options.print_gc,
            enabled: options.enabled,
        }
    }

    /// Decide the fate of an incoming request.
    ///
    /// An admitted request is counted as in flight before the mutex is
    /// released, so a concurrent shed flip either sees the arrival and
    /// drains it or happens first and sheds the request.
    pub fn admit(&self) -> Admission {
        if !self.enabled {
            return Admission::Bypass;
        }
        {
            let state = self.state.lock().expect("engine state poisoned");
            if state.available {
                self.waiter.request_arrived();
                return Admission::Served;
            }
        }
        self.metrics.record_shed();
        Admission::Shed
    }

    /// Report completion of an admitted request and, every sampling
    /// interval, schedule the check-and-collect activity.
    ///
    /// Cadence counts completions, not arrivals, so arrival bursts cannot
    /// trigger extra checks.
    pub fn complete(self: &Arc<Self>) {
        let finished = self.waiter.request_finished();
        if finished % self.window.size() == 0 {
            self.try_spawn_check();
        }
    }

    fn try_spawn_check(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().expect("engine state poisoned");
            if state.checking {
                return;
            }
            state.checking = true;
        }
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = CheckingGuard(Arc::clone(&engine));
            if let Err(err) = engine.check_and_collect().await {
                warn!(error = %err, "check-and-collect cycle aborted");
            }
        });
    }

    async fn check_and_collect(&self) -> Result<()> {
        let mut finished = self.waiter.finished_count();
        self.metrics.record_heap_check();
        let used = self.agent.check_heap().await?;
        let threshold = {
            let mut threshold = self.threshold.lock().expect("threshold poisoned");
            threshold.next_value()
        };
        let need_gc = used > threshold;
        debug!(used, threshold, need_gc, "heap checked");

        let mut wait_pending_ms: u128 = 0;
        let mut gc_ms: u128 = 0;
        if need_gc {
            {
                let mut state = self.state.lock().expect("engine state poisoned");
                state.available = false;
            }

            let wait_start = Instant::now();
            let drained = self.waiter.wait_pending().await;
            wait_pending_ms = wait_start.elapsed().as_millis();

            let gc_start = Instant::now();
            let collected = self.agent.collect().await;
            gc_ms = gc_start.elapsed().as_millis();

            let mut state = self.state.lock().expect("engine state poisoned");
            state.cumulative_finished += drained;
            match collected {
                Ok(()) => {
                    finished = state.cumulative_finished;
                    self.threshold.lock().expect("threshold poisoned").gc();
                    self.window.update(state.cumulative_finished);
                    state.cumulative_finished = 0;
                    self.waiter.reset();
                    state.available = true;
                    self.metrics.record_collect();
                }
                Err(err) => {
                    // This epoch's completions feed the next successful
                    // collect; the engine must not stay unavailable.
                    self.waiter.reset();
                    state.available = true;
                    return Err(err);
                }
            }
        }

        if self.print_gc {
            println!(
                "{},{},{},{},{},{},{}",
                epoch_ms(),
                need_gc,
                finished,
                used,
                threshold,
                wait_pending_ms,
                gc_ms
            );
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_available(&self, available: bool) {
        self.state.lock().expect("engine state poisoned").available = available;
    }

    #[cfg(test)]
    pub(crate) fn is_available(&self) -> bool {
        self.state.lock().expect("engine state poisoned").available
    }

    #[cfg(test)]
    pub(crate) fn is_checking(&self) -> bool {
        self.state.lock().expect("engine state poisoned").checking
    }

    #[cfg(test)]
    pub(crate) fn finished_count(&self) -> u64 {
        self.waiter.finished_count()
    }
}

/// Clears the single-activity guard on every exit path, panics included.
struct CheckingGuard(Arc<ControlEngine>);

impl Drop for CheckingGuard {
    fn drop(&mut self) {
        let mut state = self.0.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.checking = false;
    }
}

fn epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
