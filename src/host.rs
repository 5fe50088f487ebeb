//! Runs requests off the caller's thread. Each request gets its own task,
//! cancel token and progress slot; the caller waits on a handle whose outer
//! deadline is the budget plus a grace period.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::board::position::move_to_uci;
use crate::board::Position;
use crate::book::{HintProvider, OpeningLines};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::search::alphabeta::{ProgressSnapshot, SharedProgress};
use crate::search::clock::{CancelToken, StopReason};
use crate::search::difficulty::ProfileTable;
use crate::search::pipeline::{fallback_move, Pipeline, SearchRequest, SearchResult, SearchSource};

pub type RequestId = u64;

type Registry = Arc<Mutex<HashMap<RequestId, CancelToken>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<RequestId, CancelToken>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Engine {
    pool: rayon::ThreadPool,
    pipeline: Arc<Pipeline>,
    in_flight: Registry,
    next_id: AtomicU64,
}

impl Engine {
    /// Engine with the configured profile table and the built-in opening book.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let profiles = Arc::new(config.profile_table()?);
        Self::with_provider(config, profiles, Arc::new(OpeningLines::default()))
    }

    pub fn with_provider(config: EngineConfig, profiles: Arc<ProfileTable>, book: Arc<dyn HintProvider>) -> Result<Self, EngineError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("search-{i}"))
            .build()
            .map_err(|e| EngineError::Internal(format!("thread pool: {e}")))?;
        Ok(Self {
            pool,
            pipeline: Arc::new(Pipeline::new(profiles, book, config)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn profiles(&self) -> &ProfileTable { self.pipeline.profiles() }

    pub fn config(&self) -> &EngineConfig { self.pipeline.config() }

    /// Starts a request and returns immediately.
    pub fn compute(&self, req: SearchRequest) -> SearchHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancelToken::new();
        let progress: SharedProgress = Arc::new(Mutex::new(None));
        let started = Instant::now();
        let deadline = started + req.budget() + self.pipeline.config().grace();
        let (tx, rx) = bounded(1);
        lock(&self.in_flight).insert(id, token.clone());

        let pipeline = Arc::clone(&self.pipeline);
        let registry = Arc::clone(&self.in_flight);
        let task_req = req.clone();
        let task_token = token.clone();
        let task_progress = Arc::clone(&progress);
        self.pool.spawn(move || {
            let result = run_guarded(&pipeline, &task_req, task_token.clone(), task_progress);
            lock(&registry).remove(&id);
            if task_token.is_cancelled() {
                log::debug!("request {} cancelled; result dropped", id);
                return;
            }
            // The handle may already be gone; nobody to tell
            let _ = tx.send(result);
        });

        SearchHandle { id, rx, started, deadline, token, progress, request: req, registry: Arc::clone(&self.in_flight) }
    }

    /// Starts a request and invokes `callback` with its result. The callback
    /// never runs for a cancelled request.
    pub fn compute_with<F>(&self, req: SearchRequest, callback: F) -> RequestId
    where
        F: FnOnce(SearchResult) + Send + 'static,
    {
        let handle = self.compute(req);
        let id = handle.id();
        std::thread::spawn(move || {
            if let Ok(result) = handle.wait() {
                callback(result);
            }
        });
        id
    }

    /// Starts a request and blocks until its result (or the outer timeout).
    pub fn compute_blocking(&self, req: SearchRequest) -> Result<SearchResult, EngineError> { self.compute(req).wait() }

    /// Cancels one request. False if it already finished or never existed.
    pub fn cancel(&self, id: RequestId) -> bool {
        match lock(&self.in_flight).get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every in-flight request; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let guard = lock(&self.in_flight);
        for token in guard.values() {
            token.cancel();
        }
        guard.len()
    }

    pub fn in_flight(&self) -> usize { lock(&self.in_flight).len() }
}

fn run_guarded(pipeline: &Pipeline, req: &SearchRequest, token: CancelToken, progress: SharedProgress) -> SearchResult {
    match catch_unwind(AssertUnwindSafe(|| pipeline.run(req, token, Some(progress)))) {
        Ok(result) => result,
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::warn!("search task panicked: {}", msg);
            emergency_result(req, None, Some(format!("internal error: {msg}")))
        }
    }
}

/// Result built without the search: the best completed iteration if one was
/// published, otherwise a safe random legal move.
fn emergency_result(req: &SearchRequest, snapshot: Option<ProgressSnapshot>, error: Option<String>) -> SearchResult {
    if let Some(snap) = snapshot {
        let mut r = SearchResult::fallback(Some(move_to_uci(snap.mv)), error, StopReason::TimeExpired);
        r.source = SearchSource::Search;
        r.depth_reached = snap.depth;
        r.score_cp = snap.score_cp;
        r.nodes = snap.nodes;
        return r;
    }
    let mv = Position::from_fen(&req.fen).ok().and_then(|pos| {
        let mut rng = match req.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        fallback_move(&pos, &pos.legal_moves(), &mut rng).map(move_to_uci)
    });
    SearchResult::fallback(mv, error, StopReason::TimeExpired)
}

/// Pending result of one request.
pub struct SearchHandle {
    id: RequestId,
    rx: Receiver<SearchResult>,
    started: Instant,
    deadline: Instant,
    token: CancelToken,
    progress: SharedProgress,
    request: SearchRequest,
    registry: Registry,
}

impl SearchHandle {
    pub fn id(&self) -> RequestId { self.id }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool { self.token.is_cancelled() }

    /// Blocks until the result arrives or the outer deadline passes. On the
    /// deadline the task is cancelled and the best completed iteration (or a
    /// safe random move) is returned instead.
    pub fn wait(self) -> Result<SearchResult, EngineError> {
        match self.rx.recv_deadline(self.deadline) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Disconnected) => {
                if self.token.is_cancelled() {
                    return Err(EngineError::Cancelled(self.id));
                }
                Err(EngineError::Internal(format!("request {} lost its worker", self.id)))
            }
            Err(RecvTimeoutError::Timeout) => {
                if self.token.is_cancelled() {
                    return Err(EngineError::Cancelled(self.id));
                }
                self.token.cancel();
                lock(&self.registry).remove(&self.id);
                let snapshot = self.progress.lock().ok().and_then(|g| g.as_ref().cloned());
                log::warn!(
                    "request {} missed its {} ms budget; answering from {}",
                    self.id,
                    self.request.time_budget_ms,
                    if snapshot.is_some() { "last completed iteration" } else { "fallback move" }
                );
                let mut r = emergency_result(&self.request, snapshot, Some(EngineError::Timeout(self.request.time_budget_ms).to_string()));
                r.elapsed_ms = self.started.elapsed().as_millis() as u64;
                Ok(r)
            }
        }
    }
}
