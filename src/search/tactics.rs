//! Tactical micro-engine: mate-in-1 for and against the side to move, and a
//! cheap attack-map hanging-piece test. Runs before search at every level.

use serde::Serialize;
use shakmaty::{Board, Color, Move, Position as _, Role, Square};
use std::fmt;
use std::time::{Duration, Instant};

use crate::board::position::move_to_uci;
use crate::board::Position;
use crate::search::difficulty::TacticalScanLevel;
use crate::search::eval::{self, role_value, EvalFeatures, KING};
use crate::search::see;

/// Pre-pass budget on a typical position.
pub const DEFAULT_SCAN_BUDGET: Duration = Duration::from_millis(20);

// Net material loss at which `filter_safe` rejects a move (minor piece level)
const SAFE_LOSS_THRESHOLD_CP: i32 = 250;
// Material lead above which stalemating the opponent throws away a win
const STALEMATE_LEAD_CP: i32 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    AllowsMateIn1,
    HangsQueen,
    HangsRook,
    HangsBishop,
    HangsKnight,
    LosingCapture,
    Stalemates,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::AllowsMateIn1 => "allows_mate_in_1",
            RejectReason::HangsQueen => "hangs_queen",
            RejectReason::HangsRook => "hangs_rook",
            RejectReason::HangsBishop => "hangs_bishop",
            RejectReason::HangsKnight => "hangs_knight",
            RejectReason::LosingCapture => "losing_capture",
            RejectReason::Stalemates => "stalemates",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HangingPiece {
    pub square: Square,
    pub role: Role,
    pub color: Color,
    pub value: i32,
}

#[derive(Clone, Debug, Default)]
pub struct TacticalReport {
    pub mate_in_1_for_side: Vec<Move>,
    /// Mating moves the opponent would have if it were its turn.
    pub mate_in_1_against_side: Vec<Move>,
    pub hanging_pieces: Vec<HangingPiece>,
    /// Checks, captures and promotions for the side to move.
    pub forcing_moves: Vec<Move>,
    pub truncated: bool,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub mv: Move,
    pub reason: RejectReason,
}

#[derive(Clone, Debug, Default)]
pub struct SafetyReport {
    pub safe: Vec<Move>,
    pub rejected: Vec<Rejection>,
}

/// A root candidate with its quick evaluation and tactical flags.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredMove {
    pub mv: Move,
    pub uci: String,
    pub score: i32,
    pub delivers_mate_in_1: bool,
    pub allows_opponent_mate_in_1: bool,
    pub hangs_queen: bool,
    pub hangs_rook: bool,
    pub hangs_bishop: bool,
    pub hangs_knight: bool,
    pub captured_value: i32,
    /// Largest value among our pieces left hanging after the move.
    pub hung_value: i32,
    pub gives_check: bool,
    pub stalemates_while_ahead: bool,
}

impl ScoredMove {
    /// Net material the move puts at stake: what it takes minus the most the
    /// opponent can grab back. Negative means the move loses material.
    pub fn material_risk(&self) -> i32 {
        if self.hung_value == 0 { return 0; }
        self.captured_value - self.hung_value
    }

    /// Most serious reason this move could be rejected, if any.
    pub fn worst_reason(&self) -> Option<RejectReason> {
        if self.delivers_mate_in_1 { return None; }
        if self.allows_opponent_mate_in_1 { return Some(RejectReason::AllowsMateIn1); }
        if self.stalemates_while_ahead { return Some(RejectReason::Stalemates); }
        if self.hangs_queen { return Some(RejectReason::HangsQueen); }
        if self.hangs_rook { return Some(RejectReason::HangsRook); }
        if self.hangs_bishop { return Some(RejectReason::HangsBishop); }
        if self.hangs_knight { return Some(RejectReason::HangsKnight); }
        if self.captured_value > 0 && self.material_risk() < 0 { return Some(RejectReason::LosingCapture); }
        None
    }
}

/// Does playing `mv` checkmate the opponent?
pub fn is_mate_in_1(pos: &Position, mv: Move) -> bool {
    pos.play(mv).is_checkmate()
}

pub fn mating_moves(pos: &Position) -> Vec<Move> {
    pos.legal_moves().into_iter().filter(|&m| is_mate_in_1(pos, m)).collect()
}

/// After `mv`, can the opponent mate immediately?
pub fn allows_mate_in_1(pos: &Position, mv: Move) -> bool {
    let child = pos.play(mv);
    if child.is_checkmate() || child.is_stalemate() { return false; }
    child.chess().legal_moves().into_iter().any(|reply| {
        // Only checking replies can mate
        let next = child.play(reply);
        next.in_check() && next.is_checkmate()
    })
}

/// Returns true if the given position is stalemate (no legal moves and not in check).
pub fn is_stalemate(pos: &Position) -> bool { pos.is_stalemate() }

/// Returns true if applying `mv` results in a stalemate for the opponent.
pub fn is_stalemate_after_move(pos: &Position, mv: Move) -> bool {
    is_stalemate(&pos.play(mv))
}

/// Attack-map hanging test for the piece on `sq`: attacked, and either
/// attacked by a cheaper piece or the summed attacker value exceeds the summed
/// value of defenders of equal or lower rank. Not a full exchange evaluation.
pub fn is_piece_hanging(board: &Board, sq: Square) -> bool {
    let Some(piece) = board.piece_at(sq) else { return false };
    if piece.role == Role::King { return false; }
    let value = role_value(piece.role);
    let occupied = board.occupied();
    let attackers = board.attacks_to(sq, !piece.color, occupied);
    if attackers.is_empty() { return false; }
    let defenders = board.attacks_to(sq, piece.color, occupied);
    if defenders.is_empty() { return true; }

    // A king cannot capture into a defended square
    let attackers = attackers & !board.kings();
    if attackers.is_empty() { return false; }

    let mut min_attacker = KING;
    let mut attacker_sum = 0;
    for a in attackers {
        let v = board.role_at(a).map(role_value).unwrap_or(KING);
        min_attacker = min_attacker.min(v);
        attacker_sum += v;
    }
    if min_attacker < value { return true; }

    let defender_sum: i32 = defenders
        .into_iter()
        .filter_map(|d| board.role_at(d).map(role_value))
        .filter(|&v| v <= value)
        .sum();
    attacker_sum > defender_sum
}

/// Pieces of `color` that are hanging in `pos`.
pub fn hanging_pieces(pos: &Position, color: Color) -> Vec<HangingPiece> {
    let board = pos.chess().board();
    let mut out = Vec::new();
    for sq in board.by_color(color) & !board.kings() & !board.pawns() {
        if is_piece_hanging(board, sq) {
            if let Some(role) = board.role_at(sq) {
                out.push(HangingPiece { square: sq, role, color, value: role_value(role) });
            }
        }
    }
    out
}

fn is_forcing(pos: &Position, mv: Move) -> bool {
    mv.is_capture() || mv.is_promotion() || pos.play(mv).in_check()
}

/// Scanner configured for one difficulty profile.
#[derive(Clone, Copy, Debug)]
pub struct TacticalScanner {
    level: TacticalScanLevel,
    budget: Duration,
}

impl Default for TacticalScanner {
    fn default() -> Self { Self { level: TacticalScanLevel::Full, budget: DEFAULT_SCAN_BUDGET } }
}

impl TacticalScanner {
    pub fn new(level: TacticalScanLevel, budget: Duration) -> Self { Self { level, budget } }

    pub fn level(&self) -> TacticalScanLevel { self.level }

    fn flags_role(&self, role: Role) -> bool {
        match self.level {
            TacticalScanLevel::Off => role == Role::Queen,
            TacticalScanLevel::Basic => matches!(role, Role::Queen | Role::Rook),
            TacticalScanLevel::Full => matches!(role, Role::Queen | Role::Rook | Role::Bishop | Role::Knight),
        }
    }

    fn checks_mate_threats(&self) -> bool { self.level != TacticalScanLevel::Off }

    /// Pre-pass over the position. Mate-in-1 for the side to move is always
    /// searched; the rest stops once the budget is spent. No legal moves gives
    /// empty sets.
    pub fn analyze(&self, pos: &Position) -> TacticalReport {
        let started = Instant::now();
        let mut report = TacticalReport::default();
        let moves = pos.legal_moves();
        if moves.is_empty() {
            report.elapsed = started.elapsed();
            return report;
        }

        for &m in &moves {
            if is_mate_in_1(pos, m) { report.mate_in_1_for_side.push(m); }
            if is_forcing(pos, m) { report.forcing_moves.push(m); }
        }

        let us = pos.turn();
        report.hanging_pieces = hanging_pieces(pos, us);
        report.hanging_pieces.extend(hanging_pieces(pos, !us));

        if let Some(passed) = pos.null_move() {
            for reply in passed.legal_moves() {
                if started.elapsed() > self.budget {
                    report.truncated = true;
                    break;
                }
                if is_mate_in_1(&passed, reply) { report.mate_in_1_against_side.push(reply); }
            }
        }
        report.elapsed = started.elapsed();
        report
    }

    /// Scores and flags each move. Once the budget is spent the remaining moves
    /// skip the (expensive) opponent-mate probe; returns whether that happened.
    pub fn score_moves(&self, pos: &Position, moves: &[Move], features: &EvalFeatures) -> (Vec<ScoredMove>, bool) {
        let started = Instant::now();
        let mut truncated = false;
        let lead = eval::material_eval_cp(pos);
        let mut out = Vec::with_capacity(moves.len());
        for &mv in moves {
            let child = pos.play(mv);
            let delivers = child.is_checkmate();
            let mut sm = ScoredMove {
                mv,
                uci: move_to_uci(mv),
                score: eval::evaluate_move(pos, mv, features),
                delivers_mate_in_1: delivers,
                allows_opponent_mate_in_1: false,
                hangs_queen: false,
                hangs_rook: false,
                hangs_bishop: false,
                hangs_knight: false,
                captured_value: mv.capture().map(role_value).unwrap_or(0),
                hung_value: 0,
                gives_check: child.in_check(),
                stalemates_while_ahead: child.is_stalemate() && lead > STALEMATE_LEAD_CP,
            };
            if delivers {
                out.push(sm);
                continue;
            }
            self.flag_hanging(&child, pos.turn(), &mut sm);
            if self.checks_mate_threats() {
                if started.elapsed() <= self.budget {
                    sm.allows_opponent_mate_in_1 = allows_mate_in_1(pos, mv);
                } else {
                    truncated = true;
                }
            }
            out.push(sm);
        }
        (out, truncated)
    }

    fn flag_hanging(&self, child: &Position, mover: Color, sm: &mut ScoredMove) {
        let replies = child.legal_moves();
        for hp in hanging_pieces(child, mover) {
            // Only count pieces the opponent can actually take this turn
            if !replies.iter().any(|r| r.is_capture() && r.to() == hp.square) { continue; }
            if !self.flags_role(hp.role) { continue; }
            sm.hung_value = sm.hung_value.max(hp.value);
            match hp.role {
                Role::Queen => sm.hangs_queen = true,
                Role::Rook => sm.hangs_rook = true,
                Role::Bishop => sm.hangs_bishop = true,
                Role::Knight => sm.hangs_knight = true,
                _ => {}
            }
        }
    }

    /// Splits `moves` into safe and rejected ones with a fixed minor-piece
    /// policy, independent of difficulty. Mating moves are always safe.
    pub fn filter_safe(&self, pos: &Position, moves: &[Move]) -> SafetyReport {
        let (scored, _) = TacticalScanner::new(TacticalScanLevel::Full, self.budget).score_moves(pos, moves, &EvalFeatures::NONE);
        let mut report = SafetyReport::default();
        for sm in scored {
            let reason = if sm.delivers_mate_in_1 {
                None
            } else if sm.allows_opponent_mate_in_1 {
                Some(RejectReason::AllowsMateIn1)
            } else if sm.stalemates_while_ahead {
                Some(RejectReason::Stalemates)
            } else if sm.material_risk() <= -SAFE_LOSS_THRESHOLD_CP {
                sm.worst_reason()
            } else if sm.mv.is_capture() && see::see_gain_cp(pos, sm.mv).map_or(false, |g| g <= -SAFE_LOSS_THRESHOLD_CP) {
                Some(RejectReason::LosingCapture)
            } else {
                None
            };
            match reason {
                Some(reason) => report.rejected.push(Rejection { mv: sm.mv, reason }),
                None => report.safe.push(sm.mv),
            }
        }
        report
    }
}

/// Full-strength pre-pass with the default budget.
pub fn analyze(pos: &Position) -> TacticalReport { TacticalScanner::default().analyze(pos) }

/// Full-strength safety filter with the default budget.
pub fn filter_safe(pos: &Position, moves: &[Move]) -> SafetyReport { TacticalScanner::default().filter_safe(pos, moves) }

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(fen: &str) -> Position { Position::from_fen(fen).expect("valid fen") }

    #[test]
    fn finds_back_rank_mate() {
        let p = pos("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1");
        let report = analyze(&p);
        let mates: Vec<String> = report.mate_in_1_for_side.iter().map(|&m| move_to_uci(m)).collect();
        assert_eq!(mates, vec!["a1a8".to_string()]);
    }

    #[test]
    fn detects_mate_threat_against_side_to_move() {
        // White to move; Black threatens ...Ra1#
        let p = pos("r5k1/8/8/8/8/8/5PPP/6K1 w - - 0 1");
        let report = analyze(&p);
        assert!(report.mate_in_1_against_side.iter().any(|&m| move_to_uci(m) == "a8a1"));
    }

    #[test]
    fn terminal_position_gives_empty_report() {
        // Black is checkmated
        let p = pos("R5k1/5ppp/8/8/8/8/8/6K1 b - - 1 1");
        let report = analyze(&p);
        assert!(report.mate_in_1_for_side.is_empty());
        assert!(report.forcing_moves.is_empty());
        assert!(filter_safe(&p, &p.legal_moves()).safe.is_empty());
    }

    #[test]
    fn undefended_knight_is_hanging() {
        let p = pos("4k3/8/8/3r4/8/3N4/8/4K3 b - - 0 1");
        let h = hanging_pieces(&p, Color::White);
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].role, Role::Knight);
    }

    #[test]
    fn rook_outweighs_single_knight_defender() {
        let p = pos("4k3/8/8/3r4/8/3N4/1N6/4K3 b - - 0 1");
        let board = p.chess().board();
        assert!(is_piece_hanging(board, Square::D3));
        assert!(!is_piece_hanging(board, Square::B2));
    }

    #[test]
    fn knight_defended_by_two_knights_is_not_hanging() {
        let p = pos("4k3/8/8/3r4/8/3N4/1N3N2/4K3 b - - 0 1");
        assert!(!is_piece_hanging(p.chess().board(), Square::D3));
    }

    #[test]
    fn higher_rank_defenders_do_not_count() {
        // The queen on d1 guards d3 but outranks the knight
        let p = pos("4k3/8/8/3r4/8/3N4/8/3QK3 b - - 0 1");
        assert!(is_piece_hanging(p.chess().board(), Square::D3));
    }

    #[test]
    fn king_alone_cannot_win_a_defended_piece() {
        let p = pos("8/8/8/8/8/3k4/3N4/4K3 b - - 0 1");
        assert!(!is_piece_hanging(p.chess().board(), Square::D2));
    }

    #[test]
    fn stalemating_move_is_detected() {
        let p = pos("7R/4k1p1/6B1/1PN5/3PN3/P3BP2/6P1/R3K3 w Q - 3 33");
        let found = p.legal_moves().into_iter().any(|m| is_stalemate_after_move(&p, m));
        assert!(found, "expected at least one stalemating move from this position");
    }

    #[test]
    fn filter_rejects_queen_blunder_and_keeps_quiet_moves() {
        // Qd5?? walks into ...exd5
        let p = pos("4k3/8/4p3/8/8/8/8/3QK3 w - - 0 1");
        let moves = p.legal_moves();
        let report = filter_safe(&p, &moves);
        let qd4 = p.parse_uci("d1d5").unwrap();
        assert!(report.rejected.iter().any(|r| r.mv == qd4 && r.reason == RejectReason::HangsQueen));
        assert!(report.safe.contains(&p.parse_uci("e1f2").unwrap()));
    }

    #[test]
    fn mover_flags_allowing_back_rank_mate() {
        // Ra2 abandons the back rank to ...Rb1#; h3 gives the king air
        let p = pos("1r4k1/8/8/8/8/8/5PPP/R5K1 w - - 0 1");
        let scanner = TacticalScanner::default();
        let ra2 = p.parse_uci("a1a2").unwrap();
        let (scored, _) = scanner.score_moves(&p, &[ra2], &EvalFeatures::NONE);
        assert!(scored[0].allows_opponent_mate_in_1);
        let h3 = p.parse_uci("h2h3").unwrap();
        let (scored, _) = scanner.score_moves(&p, &[h3], &EvalFeatures::NONE);
        assert!(!scored[0].allows_opponent_mate_in_1);
    }
}
