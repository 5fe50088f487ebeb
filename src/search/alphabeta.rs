use shakmaty::Move;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::board::Position;
use crate::search::clock::{SearchClock, StopReason};
use crate::search::difficulty::DifficultyProfile;
use crate::search::eval::{evaluate, is_mate_score, mvv_lva, EvalFeatures, DRAW_SCORE, MATE_SCORE, MAX_PLY};
use crate::search::see;

const INF: i32 = MATE_SCORE + 1;
// Effective branching factor used to project the next iteration's cost
const BRANCHING_ESTIMATE: u32 = 3;
const ASPIRATION_WIDEN: i32 = 4;

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub min_depth: u32,
    pub target_depth: u32,
    pub hard_cap_depth: u32,
    /// Root moves whose scores must be exact; weaker moves may fail low.
    pub beam_width: usize,
    pub quiescence_max_depth: u32,
    pub aspiration_window_cp: i32,
    pub features: EvalFeatures,
    pub use_killers: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            min_depth: 1,
            target_depth: 3,
            hard_cap_depth: 4,
            beam_width: 1,
            quiescence_max_depth: 4,
            aspiration_window_cp: 0,
            features: EvalFeatures::ALL,
            use_killers: true,
        }
    }
}

impl SearchParams {
    pub fn from_profile(p: &DifficultyProfile) -> Self {
        Self {
            min_depth: p.min_depth.max(1),
            target_depth: p.target_depth,
            hard_cap_depth: p.hard_cap_depth,
            beam_width: p.beam_width.max(1),
            quiescence_max_depth: p.quiescence_max_depth,
            aspiration_window_cp: p.aspiration_window_cp,
            features: p.eval,
            use_killers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootScore {
    pub mv: Move,
    pub score: i32,
    /// False when the move failed low against the beam threshold; its score is
    /// only an upper bound.
    pub exact: bool,
}

/// Scores of every root move from one iteration, in the order searched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Iteration {
    pub depth: u32,
    pub scores: Vec<RootScore>,
    pub best_score: i32,
    pub elapsed: Duration,
}

impl Iteration {
    pub fn best(&self) -> Option<&RootScore> {
        let mut best: Option<&RootScore> = None;
        for rs in &self.scores {
            if best.map_or(true, |b| rs.score > b.score) { best = Some(rs); }
        }
        best
    }

    /// Moves eligible for the final pick, as (move, score) in search order.
    pub fn candidates(&self) -> Vec<(Move, i32)> {
        let exact: Vec<(Move, i32)> = self.scores.iter().filter(|r| r.exact).map(|r| (r.mv, r.score)).collect();
        if exact.is_empty() { self.scores.iter().map(|r| (r.mv, r.score)).collect() } else { exact }
    }

    fn kth_score(&self, k: usize) -> i32 {
        let mut s: Vec<i32> = self.scores.iter().map(|r| r.score).collect();
        s.sort_unstable_by(|a, b| b.cmp(a));
        s.get(k.max(1) - 1).copied().unwrap_or(-INF)
    }

    pub fn proves_mate(&self) -> bool { self.best_score >= MATE_SCORE - MAX_PLY }
}

/// Best move of the deepest completed iteration, readable from other threads
/// while the search runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub mv: Move,
    pub score_cp: i32,
    pub depth: u32,
    pub nodes: u64,
}

pub type SharedProgress = Arc<Mutex<Option<ProgressSnapshot>>>;

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Deepest completed iteration (or a partial one that proved mate).
    pub iteration: Option<Iteration>,
    pub depth_reached: u32,
    pub nodes: u64,
    pub stop_reason: StopReason,
    pub complete: bool,
}

pub struct Searcher {
    params: SearchParams,
    pub(crate) nodes: u64,
    pub(crate) aspiration_misses: u32,
    killers: Vec<[Option<Move>; 2]>,
    progress: Option<SharedProgress>,
}

impl Default for Searcher {
    fn default() -> Self { Self::new(SearchParams::default()) }
}

impl Searcher {
    pub fn new(params: SearchParams) -> Self {
        Self { params, nodes: 0, aspiration_misses: 0, killers: vec![[None, None]; MAX_PLY as usize], progress: None }
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn nodes(&self) -> u64 { self.nodes }

    /// Quiescence value of a quiet-ish position, full window.
    pub fn qsearch_eval_cp(&mut self, pos: &Position, clock: &mut SearchClock) -> i32 {
        self.qsearch(pos, -INF, INF, 0, 0, clock)
    }

    /// Iterative deepening over `root` (already ordered, all legal in `pos`).
    pub fn search(&mut self, pos: &Position, root: &[Move], clock: &mut SearchClock) -> SearchOutcome {
        self.nodes = 0;
        let mut order: Vec<Move> = root.to_vec();
        let mut last: Option<Iteration> = None;
        let p = self.params;

        if order.is_empty() {
            return SearchOutcome { iteration: None, depth_reached: 0, nodes: 0, stop_reason: StopReason::Terminal, complete: true };
        }

        let mut depth = p.min_depth.min(p.hard_cap_depth.max(1));
        let stop = loop {
            let started = Instant::now();
            match self.search_iteration(pos, &order, depth, last.as_ref(), clock) {
                IterationResult::Complete(mut it) => {
                    it.elapsed = started.elapsed();
                    log::debug!(
                        "depth {} score {} nodes {} best {:?} in {:?}",
                        depth,
                        it.best_score,
                        self.nodes,
                        it.best().map(|b| crate::board::position::move_to_uci(b.mv)),
                        it.elapsed
                    );
                    order = reorder(&it);
                    self.publish(&it);
                    let mate = it.proves_mate();
                    let next_cost = it.elapsed * BRANCHING_ESTIMATE;
                    last = Some(it);
                    if mate { break StopReason::TargetReached; }
                    if depth >= p.hard_cap_depth { break StopReason::DepthCap; }
                    if depth >= p.target_depth && next_cost > clock.remaining() { break StopReason::TargetReached; }
                    depth += 1;
                }
                IterationResult::Partial(it) => {
                    // A proven mate survives even an unfinished iteration
                    if it.proves_mate() {
                        log::debug!("keeping partial depth {} mate score {}", depth, it.best_score);
                        self.publish(&it);
                        last = Some(it);
                    }
                    break clock.stop_reason().unwrap_or(StopReason::TimeExpired);
                }
            }
        };

        let depth_reached = last.as_ref().map_or(0, |it| it.depth);
        let complete = last.as_ref().map_or(false, |it| it.depth >= p.target_depth || it.proves_mate());
        SearchOutcome { iteration: last, depth_reached, nodes: self.nodes, stop_reason: stop, complete }
    }

    fn publish(&self, it: &Iteration) {
        let Some(slot) = &self.progress else { return };
        let Some(best) = it.best() else { return };
        if let Ok(mut guard) = slot.lock() {
            *guard = Some(ProgressSnapshot { mv: best.mv, score_cp: best.score, depth: it.depth, nodes: self.nodes });
        }
    }

    fn search_iteration(&mut self, pos: &Position, root: &[Move], depth: u32, prev: Option<&Iteration>, clock: &mut SearchClock) -> IterationResult {
        let beam = self.params.beam_width;
        let mut window = match prev {
            Some(_) if self.params.aspiration_window_cp > 0 => self.params.aspiration_window_cp,
            _ => 0,
        };
        loop {
            let (lo, hi) = match prev {
                Some(pv) if window > 0 => (pv.kth_score(beam) - window, pv.best_score + window),
                _ => (-INF, INF),
            };
            let it = match self.root_pass(pos, root, depth, lo, hi, clock) {
                IterationResult::Complete(it) => it,
                partial => return partial,
            };
            let fail_low = lo > -INF && it.kth_score(beam) <= lo;
            let fail_high = hi < INF && it.best_score >= hi;
            if !fail_low && !fail_high { return IterationResult::Complete(it); }
            log::debug!("aspiration miss at depth {} window {} ({}..{})", depth, window, lo, hi);
            self.aspiration_misses += 1;
            window = if window >= self.params.aspiration_window_cp * ASPIRATION_WIDEN { 0 } else { window * ASPIRATION_WIDEN };
        }
    }

    /// One full-width pass over the root. The lower bound rises to the
    /// beam-th best score so far, so every move that can still enter the beam
    /// gets an exact score.
    fn root_pass(&mut self, pos: &Position, root: &[Move], depth: u32, lo: i32, hi: i32, clock: &mut SearchClock) -> IterationResult {
        let beam = self.params.beam_width;
        let mut it = Iteration { depth, scores: Vec::with_capacity(root.len()), best_score: -INF, elapsed: Duration::ZERO };
        let mut top: Vec<i32> = Vec::with_capacity(beam + 1);
        for &mv in root {
            let alpha = if top.len() >= beam { lo.max(top[beam - 1]) } else { lo };
            let child = pos.play(mv);
            let score = -self.alphabeta(&child, depth - 1, -hi, -alpha, 1, clock);
            if clock.is_stopped() {
                return IterationResult::Partial(it);
            }
            let exact = score > alpha || alpha == -INF;
            it.scores.push(RootScore { mv, score, exact });
            if score > it.best_score { it.best_score = score; }
            let at = top.iter().position(|&s| score > s).unwrap_or(top.len());
            top.insert(at, score);
            top.truncate(beam);
        }
        IterationResult::Complete(it)
    }

    fn alphabeta(&mut self, pos: &Position, depth: u32, mut alpha: i32, beta: i32, ply: i32, clock: &mut SearchClock) -> i32 {
        self.nodes += 1;
        if clock.tick() { return DRAW_SCORE; }

        let moves = pos.legal_moves();
        if moves.is_empty() { return terminal_score(pos, ply); }
        if is_draw(pos) { return DRAW_SCORE; }
        if depth == 0 || ply >= MAX_PLY - 1 {
            return if self.params.quiescence_max_depth > 0 {
                self.qsearch(pos, alpha, beta, ply, 0, clock)
            } else {
                evaluate(pos, &self.params.features)
            };
        }

        let mut moves = moves;
        self.order_moves(&mut moves, ply);

        let mut best = -INF;
        let mut best_move: Option<Move> = None;
        for m in moves {
            let child = pos.play(m);
            let score = -self.alphabeta(&child, depth - 1, -beta, -alpha, ply + 1, clock);
            if clock.is_stopped() { return best.max(alpha); }
            if score > best {
                best = score;
                best_move = Some(m);
            }
            if best > alpha { alpha = best; }
            if alpha >= beta { break; }
        }
        if let Some(mv) = best_move {
            if self.params.use_killers && best >= beta && !mv.is_capture() {
                self.update_killers(ply, mv);
            }
        }
        best
    }

    fn qsearch(&mut self, pos: &Position, mut alpha: i32, beta: i32, ply: i32, qdepth: u32, clock: &mut SearchClock) -> i32 {
        self.nodes += 1;
        if clock.tick() { return DRAW_SCORE; }

        let in_check = pos.in_check();
        let moves = pos.legal_moves();
        if moves.is_empty() { return terminal_score(pos, ply); }

        let stand = evaluate(pos, &self.params.features);
        if qdepth >= self.params.quiescence_max_depth || ply >= MAX_PLY - 1 { return stand; }
        if !in_check {
            // Stand pat
            if stand >= beta { return stand; }
            if stand > alpha { alpha = stand; }
        }

        let mut tactical: Vec<Move> = if in_check {
            moves
        } else {
            moves
                .into_iter()
                .filter(|&m| m.is_capture() || m.is_promotion() || (qdepth == 0 && pos.play(m).in_check()))
                .collect()
        };
        tactical.sort_by_key(|&m| -mvv_lva(m));

        let mut best = if in_check { -INF } else { stand };
        for m in tactical {
            // SEE pruning: skip clearly losing captures
            if !in_check {
                if let Some(gain) = see::see_gain_cp(pos, m) {
                    if gain < 0 && stand + gain + 50 < alpha { continue; }
                }
            }
            let child = pos.play(m);
            let score = -self.qsearch(&child, -beta, -alpha, ply + 1, qdepth + 1, clock);
            if clock.is_stopped() { return best.max(alpha); }
            if score > best { best = score; }
            if score >= beta { return score; }
            if score > alpha { alpha = score; }
        }
        best
    }

    fn order_moves(&self, moves: &mut [Move], ply: i32) {
        moves.sort_by_key(|&m| {
            let cap = if m.is_capture() { 10_000 + mvv_lva(m) } else { 0 };
            let promo = if m.is_promotion() { 9_000 } else { 0 };
            let kb = if self.params.use_killers { self.killer_bonus(ply, m) } else { 0 };
            -(cap + promo + kb)
        });
    }

    fn update_killers(&mut self, ply: i32, m: Move) {
        let p = ply as usize;
        if p >= self.killers.len() { return; }
        let slot = &mut self.killers[p];
        if slot[0] == Some(m) { return; }
        slot[1] = slot[0];
        slot[0] = Some(m);
    }

    fn killer_bonus(&self, ply: i32, m: Move) -> i32 {
        let p = ply as usize;
        if p >= self.killers.len() { return 0; }
        let slot = &self.killers[p];
        if slot[0] == Some(m) { 50 } else if slot[1] == Some(m) { 30 } else { 0 }
    }
}

enum IterationResult {
    Complete(Iteration),
    Partial(Iteration),
}

/// Next iteration searches the previous best moves first; ties keep order.
fn reorder(it: &Iteration) -> Vec<Move> {
    let mut scored: Vec<&RootScore> = it.scores.iter().collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.into_iter().map(|r| r.mv).collect()
}

fn terminal_score(pos: &Position, ply: i32) -> i32 {
    if pos.in_check() { -MATE_SCORE + ply } else { DRAW_SCORE }
}

fn is_draw(pos: &Position) -> bool {
    pos.halfmoves() >= 100 || pos.is_insufficient_material()
}

/// Mate distance in moves for a mate score, signed from the scorer's side.
pub fn mate_in(score: i32) -> Option<i32> {
    if !is_mate_score(score) { return None; }
    let plies = MATE_SCORE - score.abs();
    let moves = (plies + 1) / 2;
    Some(if score > 0 { moves } else { -moves })
}
