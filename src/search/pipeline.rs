//! Per-request control flow: terminal check, opening book, tactical pre-pass,
//! blunder gate, iterative deepening and the final beam pick.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shakmaty::Move;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::board::position::move_to_uci;
use crate::board::Position;
use crate::book::{HintProvider, HintQuery, HintResponse, NoHints};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::search::alphabeta::{SearchParams, Searcher, SharedProgress};
use crate::search::clock::{CancelToken, SearchClock, StopReason};
use crate::search::difficulty::{DifficultyProfile, ProfileTable};
use crate::search::eval::MATE_SCORE;
use crate::search::gate::{apply_gate, GateOutcome};
use crate::search::noise::choose_from_beam;
use crate::search::tactics::{RejectReason, ScoredMove, TacticalScanner};

// Root ordering boost for captures that do not lose material
const SAFE_CAPTURE_BOOST: i32 = 1_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub fen: String,
    pub difficulty_level: i64,
    pub time_budget_ms: u64,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub move_history: Option<Vec<String>>,
    /// Fixes the beam pick; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SearchRequest {
    pub fn new(fen: impl Into<String>, difficulty_level: i64, time_budget_ms: u64) -> Self {
        Self { fen: fen.into(), difficulty_level, time_budget_ms, debug: false, move_history: None, seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_history(mut self, moves: Vec<String>) -> Self {
        self.move_history = Some(moves);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn budget(&self) -> Duration { Duration::from_millis(self.time_budget_ms) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    TacticalSafe,
    Search,
    Fallback,
    OpeningBook,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Checkmate,
    Stalemate,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TacticalSafety {
    pub rejected_count: usize,
    pub reasons: Vec<RejectReason>,
    pub safety_valve_used: bool,
    pub scan_truncated: bool,
}

impl TacticalSafety {
    fn from_gate(gate: &GateOutcome, scan_truncated: bool) -> Self {
        Self {
            rejected_count: gate.rejected_count(),
            reasons: gate.reasons(),
            safety_valve_used: gate.safety_valve_used,
            scan_truncated,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInfo {
    #[serde(rename = "move")]
    pub uci: String,
    pub score_cp: i32,
}

/// Extra detail returned when the request sets `debug`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub level: u8,
    pub candidates: Vec<CandidateInfo>,
    pub rejected: Vec<CandidateInfo>,
    pub book_line: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(rename = "move")]
    pub best_move: Option<String>,
    pub depth_reached: u32,
    pub elapsed_ms: u64,
    pub slice_count: u32,
    pub complete: bool,
    pub source: SearchSource,
    pub tactical_safety: TacticalSafety,
    pub score_cp: i32,
    pub nodes: u64,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<Terminal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl SearchResult {
    fn empty(source: SearchSource, stop_reason: StopReason) -> Self {
        Self {
            best_move: None,
            depth_reached: 0,
            elapsed_ms: 0,
            slice_count: 0,
            complete: false,
            source,
            tactical_safety: TacticalSafety::default(),
            score_cp: 0,
            nodes: 0,
            stop_reason,
            terminal: None,
            error: None,
            debug: None,
        }
    }

    /// Result for a request that could not be searched normally.
    pub fn fallback(best_move: Option<String>, error: Option<String>, stop_reason: StopReason) -> Self {
        let mut r = Self::empty(SearchSource::Fallback, stop_reason);
        r.best_move = best_move;
        r.error = error;
        r
    }

    /// The chosen move, or `NoLegalMoves` when the position was terminal or
    /// no move could be produced.
    pub fn require_move(&self) -> Result<&str, EngineError> {
        self.best_move.as_deref().ok_or(EngineError::NoLegalMoves)
    }

    pub fn to_json(&self) -> Result<String, EngineError> { Ok(serde_json::to_string(self)?) }
}

/// Random legal move, preferring ones the safety filter accepts.
pub fn fallback_move(pos: &Position, moves: &[Move], rng: &mut SmallRng) -> Option<Move> {
    if moves.is_empty() { return None; }
    let report = TacticalScanner::default().filter_safe(pos, moves);
    let pool: &[Move] = if report.safe.is_empty() { moves } else { &report.safe };
    Some(pool[rng.gen_range(0..pool.len())])
}

/// Shared, read-only state for running requests.
#[derive(Clone)]
pub struct Pipeline {
    profiles: Arc<ProfileTable>,
    book: Arc<dyn HintProvider>,
    config: EngineConfig,
}

impl Default for Pipeline {
    fn default() -> Self { Self::new(Arc::new(ProfileTable::builtin()), Arc::new(NoHints), EngineConfig::default()) }
}

impl Pipeline {
    pub fn new(profiles: Arc<ProfileTable>, book: Arc<dyn HintProvider>, config: EngineConfig) -> Self {
        Self { profiles, book, config }
    }

    pub fn profiles(&self) -> &ProfileTable { &self.profiles }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Runs one request to completion on the current thread.
    pub fn run(&self, req: &SearchRequest, token: CancelToken, progress: Option<SharedProgress>) -> SearchResult {
        let started = Instant::now();
        let mut result = self.run_inner(req, token, progress, started);
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "level {} move {:?} source {:?} depth {} score {} nodes {} in {} ms ({:?})",
            req.difficulty_level,
            result.best_move,
            result.source,
            result.depth_reached,
            result.score_cp,
            result.nodes,
            result.elapsed_ms,
            result.stop_reason
        );
        result
    }

    fn run_inner(&self, req: &SearchRequest, token: CancelToken, progress: Option<SharedProgress>, started: Instant) -> SearchResult {
        let pos = match Position::from_fen(&req.fen) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("rejecting request: {}", e);
                return SearchResult::fallback(None, Some(e.to_string()), StopReason::Terminal);
            }
        };
        let profile = self.profiles.resolve(req.difficulty_level);
        let legal = pos.legal_moves();
        if legal.is_empty() {
            let mut r = SearchResult::empty(SearchSource::Search, StopReason::Terminal);
            r.complete = true;
            r.terminal = Some(if pos.in_check() { Terminal::Checkmate } else { Terminal::Stalemate });
            r.score_cp = if pos.in_check() { -MATE_SCORE } else { 0 };
            return r;
        }

        let mut rng = match req.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let budget = req.budget().saturating_sub(started.elapsed());
        let mut clock = SearchClock::new(budget, self.config.slice(), token);
        let scanner = TacticalScanner::new(profile.tactical_scan_level, self.config.tactical_budget());
        let mut debug = req.debug.then(|| DebugInfo { level: profile.level, ..DebugInfo::default() });

        let report = scanner.analyze(&pos);
        if let Some(&mate) = report.mate_in_1_for_side.first() {
            let mut r = SearchResult::empty(SearchSource::TacticalSafe, StopReason::Tactical);
            r.best_move = Some(move_to_uci(mate));
            r.depth_reached = 1;
            r.complete = true;
            r.score_cp = MATE_SCORE - 1;
            r.tactical_safety.scan_truncated = report.truncated;
            r.debug = debug;
            return r;
        }

        let mut nudges: HashMap<String, i32> = HashMap::new();
        if profile.use_opening_book {
            if let Some(r) = self.consult_book(req, &pos, &mut nudges, &mut debug) {
                return r;
            }
        }

        let (scored, truncated) = scanner.score_moves(&pos, &legal, &profile.eval);
        let gate = apply_gate(&scored, profile.gate_tier);
        let mut root = order_root(&gate.allowed, &nudges);
        root.truncate(beam_size(profile, gate.allowed.len()));
        if let Some(d) = debug.as_mut() {
            d.rejected = gate.rejected.iter().map(|r| CandidateInfo { uci: r.uci.clone(), score_cp: r.risk_cp }).collect();
        }

        let mut searcher = Searcher::new(SearchParams::from_profile(profile));
        if let Some(p) = progress {
            searcher = searcher.with_progress(p);
        }
        let outcome = searcher.search(&pos, &root, &mut clock);

        let mut r = SearchResult::empty(SearchSource::Search, outcome.stop_reason);
        r.tactical_safety = TacticalSafety::from_gate(&gate, truncated || report.truncated);
        r.nodes = outcome.nodes;
        r.slice_count = clock.slice_count();
        r.depth_reached = outcome.depth_reached;
        r.complete = outcome.complete;

        match outcome.iteration {
            Some(it) => {
                let candidates = it.candidates();
                let beam = if it.proves_mate() { 1 } else { beam_size(profile, gate.allowed.len()) };
                if let Some(i) = choose_from_beam(&candidates, beam, &mut rng) {
                    r.best_move = Some(move_to_uci(candidates[i].0));
                    r.score_cp = candidates[i].1;
                }
                if let Some(d) = debug.as_mut() {
                    d.candidates = candidates.iter().map(|(m, s)| CandidateInfo { uci: move_to_uci(*m), score_cp: *s }).collect();
                }
            }
            None => {
                // Nothing completed in time: a safe move from the gate survivors
                log::warn!("no search iteration completed within {} ms; falling back", req.time_budget_ms);
                r.source = SearchSource::Fallback;
                r.best_move = fallback_move(&pos, &root, &mut rng).map(move_to_uci);
            }
        }
        r.debug = debug;
        r
    }

    fn consult_book(&self, req: &SearchRequest, pos: &Position, nudges: &mut HashMap<String, i32>, debug: &mut Option<DebugInfo>) -> Option<SearchResult> {
        let history = req.move_history.clone().unwrap_or_default();
        let ply_count = if history.is_empty() { pos.ply_count() } else { history.len() as u32 };
        if ply_count >= self.config.book_ply_threshold { return None; }

        let query = HintQuery { fen: pos.fen(), move_history: history, ply_count };
        match self.book.query(&query) {
            Ok(HintResponse::Suggested { uci, name }) => {
                let mv = pos.parse_uci(&uci)?;
                let safe = TacticalScanner::default().filter_safe(pos, &[mv]);
                if safe.safe.is_empty() {
                    log::debug!("book move {} rejected by safety filter", uci);
                    return None;
                }
                let mut r = SearchResult::empty(SearchSource::OpeningBook, StopReason::Book);
                r.best_move = Some(move_to_uci(mv));
                r.complete = true;
                if let Some(d) = debug.as_mut() {
                    d.book_line = name;
                }
                r.debug = debug.take();
                Some(r)
            }
            Ok(HintResponse::Hints { hints }) => {
                for h in hints {
                    *nudges.entry(h.uci).or_insert(0) += h.weight;
                }
                None
            }
            Ok(HintResponse::Empty) => None,
            Err(e) => {
                log::debug!("hint provider failed: {}", e);
                None
            }
        }
    }
}

/// Number of root moves eligible for the final pick.
pub fn beam_size(profile: &DifficultyProfile, survivors: usize) -> usize {
    profile.beam_width.max(1).min(survivors.max(1))
}

/// Root order: quick score plus book nudges, with non-losing captures ahead
/// of quiet moves. Mating moves lead.
pub fn order_root(allowed: &[ScoredMove], nudges: &HashMap<String, i32>) -> Vec<Move> {
    let mut keyed: Vec<(i32, Move)> = allowed
        .iter()
        .map(|sm| {
            let mut key = sm.score + nudges.get(&sm.uci).copied().unwrap_or(0);
            if sm.delivers_mate_in_1 {
                key += MATE_SCORE;
            } else if sm.captured_value > 0 && sm.material_risk() >= 0 {
                key += SAFE_CAPTURE_BOOST;
            }
            (key, sm.mv)
        })
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    keyed.into_iter().map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::OpeningLines;
    use pretty_assertions::assert_eq;

    const ITALIAN: &str = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3";

    #[test]
    fn invalid_fen_gives_fallback_without_move() {
        let r = Pipeline::default().run(&SearchRequest::new("not a fen", 3, 200), CancelToken::new(), None);
        assert_eq!(r.source, SearchSource::Fallback);
        assert_eq!(r.best_move, None);
        assert!(r.error.is_some());
        assert_eq!(r.require_move(), Err(EngineError::NoLegalMoves));
    }

    #[test]
    fn checkmated_side_gets_terminal_result() {
        let r = Pipeline::default().run(&SearchRequest::new("R5k1/5ppp/8/8/8/8/8/6K1 b - - 1 1", 2, 200), CancelToken::new(), None);
        assert_eq!(r.terminal, Some(Terminal::Checkmate));
        assert_eq!(r.best_move, None);
    }

    #[test]
    fn stalemated_side_gets_terminal_result() {
        let r = Pipeline::default().run(&SearchRequest::new("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 2, 200), CancelToken::new(), None);
        assert_eq!(r.terminal, Some(Terminal::Stalemate));
    }

    #[test]
    fn book_suggestion_is_played_in_known_line() {
        let pipeline = Pipeline::new(Arc::new(ProfileTable::builtin()), Arc::new(OpeningLines::default()), EngineConfig::default());
        let req = SearchRequest::new(ITALIAN, 3, 500).with_debug(true);
        let r = pipeline.run(&req, CancelToken::new(), None);
        assert_eq!(r.source, SearchSource::OpeningBook);
        assert_eq!(r.best_move.as_deref(), Some("f8c5"));
        assert_eq!(r.debug.and_then(|d| d.book_line).as_deref(), Some("Italian Game"));
    }

    #[test]
    fn root_order_puts_safe_captures_first() {
        let pos = Position::from_fen("4k3/8/8/3p4/8/8/8/3RK3 w - - 0 1").unwrap();
        let (scored, _) = TacticalScanner::default().score_moves(&pos, &pos.legal_moves(), &crate::search::eval::EvalFeatures::ALL);
        let root = order_root(&scored, &HashMap::new());
        assert_eq!(move_to_uci(root[0]), "d1d5");
    }

    #[test]
    fn root_is_limited_to_beam_width() {
        let pipeline = Pipeline::default();
        for level in [1, 3, 5] {
            let beam = pipeline.profiles().resolve(level).beam_width;
            let req = SearchRequest::new(crate::board::position::START_FEN, level, 1000).with_seed(7).with_debug(true);
            let r = pipeline.run(&req, CancelToken::new(), None);
            let debug = r.debug.expect("debug info requested");
            assert!(debug.candidates.len() <= beam, "level {level}: {} candidates for beam {beam}", debug.candidates.len());
            if r.source == SearchSource::Search {
                assert!(!debug.candidates.is_empty());
                let mv = r.best_move.unwrap();
                assert!(debug.candidates.iter().any(|c| c.uci == mv));
            }
        }
    }

    #[test]
    fn beam_of_one_searches_the_top_ordered_move() {
        let pos = Position::from_fen("4k3/8/8/3p4/8/8/8/3RK3 w - - 0 1").unwrap();
        let (scored, _) = TacticalScanner::default().score_moves(&pos, &pos.legal_moves(), &crate::search::eval::EvalFeatures::ALL);
        let mut root = order_root(&scored, &HashMap::new());
        let profile = ProfileTable::builtin().highest().clone();
        root.truncate(beam_size(&profile, scored.len()));
        assert_eq!(root.len(), 1);
        assert_eq!(move_to_uci(root[0]), "d1d5");
    }

    #[test]
    fn result_serialises_camel_case() {
        let r = Pipeline::default().run(&SearchRequest::new(crate::board::position::START_FEN, 1, 300).with_seed(3), CancelToken::new(), None);
        let json = r.to_json().unwrap();
        assert!(json.contains("\"depthReached\""));
        assert!(json.contains("\"move\""));
        assert!(json.contains("\"tacticalSafety\""));
        assert!(!json.contains("\"terminal\""));
    }
}
