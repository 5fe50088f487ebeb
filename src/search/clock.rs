use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default cooperative slice length.
pub const DEFAULT_SLICE: Duration = Duration::from_millis(16);

// Nodes between clock reads; keeps `Instant::now()` off the hot path
const CHECK_EVERY_NODES: u64 = 1024;

/// Shared cancellation flag for one request.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    DepthCap,
    TargetReached,
    TimeExpired,
    Cancelled,
    Tactical,
    Terminal,
    Book,
}

/// Wall-clock budget for a single request, sliced at a fixed cadence. At each
/// slice boundary the search yields its thread and re-reads the cancel flag.
#[derive(Debug)]
pub struct SearchClock {
    deadline: Instant,
    slice: Duration,
    next_yield: Instant,
    slices: u32,
    nodes_since_check: u64,
    token: CancelToken,
    stopped: Option<StopReason>,
}

impl SearchClock {
    pub fn new(budget: Duration, slice: Duration, token: CancelToken) -> Self {
        let start = Instant::now();
        let slice = slice.max(Duration::from_millis(1));
        Self {
            deadline: start + budget,
            slice,
            next_yield: start + slice,
            slices: 0,
            nodes_since_check: 0,
            token,
            stopped: None,
        }
    }

    /// Clock without cancellation, mostly for tests and tools.
    pub fn with_budget(budget: Duration) -> Self { Self::new(budget, DEFAULT_SLICE, CancelToken::new()) }

    pub fn remaining(&self) -> Duration { self.deadline.saturating_duration_since(Instant::now()) }

    pub fn slice_count(&self) -> u32 { self.slices }

    pub fn stop_reason(&self) -> Option<StopReason> { self.stopped }

    pub fn is_stopped(&self) -> bool { self.stopped.is_some() }

    /// Called once per node. Returns true once the search must unwind.
    #[inline]
    pub fn tick(&mut self) -> bool {
        if self.stopped.is_some() { return true; }
        self.nodes_since_check += 1;
        if self.nodes_since_check < CHECK_EVERY_NODES { return false; }
        self.nodes_since_check = 0;
        self.poll()
    }

    /// Reads the clock and the cancel flag now, yielding if a slice ended.
    pub fn poll(&mut self) -> bool {
        if self.stopped.is_some() { return true; }
        if self.token.is_cancelled() {
            self.stopped = Some(StopReason::Cancelled);
            return true;
        }
        let now = Instant::now();
        if now >= self.deadline {
            self.stopped = Some(StopReason::TimeExpired);
            return true;
        }
        if now >= self.next_yield {
            self.slices += 1;
            self.next_yield = now + self.slice;
            std::thread::yield_now();
            if self.token.is_cancelled() {
                self.stopped = Some(StopReason::Cancelled);
                return true;
            }
        }
        false
    }
}
