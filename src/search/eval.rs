use serde::{Deserialize, Serialize};
use shakmaty::{attacks, Bitboard, Board, Color, File, Move, Position as _, Role, Square};

use crate::board::Position;
use crate::search::see;

pub const PAWN: i32 = 100;
pub const KNIGHT: i32 = 320;
pub const BISHOP: i32 = 330;
pub const ROOK: i32 = 500;
pub const QUEEN: i32 = 900;
pub const KING: i32 = 20_000;

// Mate scoring helpers
pub const MATE_SCORE: i32 = 30_000;
pub const DRAW_SCORE: i32 = 0;
pub const MAX_PLY: i32 = 128;

const BISHOP_PAIR_BONUS: i32 = 30;
const ROOK_OPEN_FILE_BONUS: i32 = 25;
const ROOK_HALF_OPEN_FILE_BONUS: i32 = 12;
const PASSED_PAWN_BASE: i32 = 10;
const PASSED_PAWN_PER_RANK: i32 = 12;
const CHECK_BONUS: i32 = 50;
const EARLY_QUEEN_TRADE_PENALTY: i32 = 40;

pub fn role_value(role: Role) -> i32 {
    match role {
        Role::Pawn => PAWN,
        Role::Knight => KNIGHT,
        Role::Bishop => BISHOP,
        Role::Rook => ROOK,
        Role::Queen => QUEEN,
        Role::King => KING,
    }
}

pub fn is_mate_score(score: i32) -> bool { score.abs() >= MATE_SCORE - MAX_PLY }

/// Optional evaluation terms. Material, center control and king exposure are
/// always on; everything here is switched per difficulty profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvalFeatures {
    pub development: bool,
    pub knight_rim: bool,
    pub early_queen_trade: bool,
    pub bishop_pair: bool,
    pub rook_open_file: bool,
    pub passed_pawns: bool,
    pub mobility: bool,
}

impl EvalFeatures {
    pub const NONE: EvalFeatures = EvalFeatures {
        development: false,
        knight_rim: false,
        early_queen_trade: false,
        bishop_pair: false,
        rook_open_file: false,
        passed_pawns: false,
        mobility: false,
    };

    pub const ALL: EvalFeatures = EvalFeatures {
        development: true,
        knight_rim: true,
        early_queen_trade: true,
        bishop_pair: true,
        rook_open_file: true,
        passed_pawns: true,
        mobility: true,
    };
}

impl Default for EvalFeatures {
    fn default() -> Self { EvalFeatures::ALL }
}

fn count(board: &Board, color: Color, role: Role) -> i32 {
    (board.by_color(color) & board.by_role(role)).count() as i32
}

fn material_of(board: &Board, color: Color) -> i32 {
    [Role::Pawn, Role::Knight, Role::Bishop, Role::Rook, Role::Queen]
        .iter()
        .map(|&r| count(board, color, r) * role_value(r))
        .sum()
}

fn non_pawn_material(board: &Board) -> i32 {
    Color::ALL.iter().map(|&c| material_of(board, c) - count(board, c, Role::Pawn) * PAWN).sum()
}

// Side-agnostic material in centipawns: positive means White has more material.
pub fn material_eval_cp_side_agnostic(pos: &Position) -> i32 {
    let board = pos.chess().board();
    material_of(board, Color::White) - material_of(board, Color::Black)
}

// Material from side-to-move perspective (negamax-friendly)
pub fn material_eval_cp(pos: &Position) -> i32 {
    let base = material_eval_cp_side_agnostic(pos);
    if pos.turn() == Color::White { base } else { -base }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Opening,
    Middlegame,
    Endgame,
}

fn phase(pos: &Position) -> Phase {
    let npm = non_pawn_material(pos.chess().board());
    if npm <= 2 * (ROOK + BISHOP) { return Phase::Endgame; }
    if pos.fullmoves() <= 12 && npm >= 5_000 { Phase::Opening } else { Phase::Middlegame }
}

/// Static evaluation in centipawns, positive favours the side to move.
/// A pure function of the position and the enabled feature set.
pub fn evaluate(pos: &Position, features: &EvalFeatures) -> i32 {
    let white = evaluate_white(pos, features);
    if pos.turn() == Color::White { white } else { -white }
}

/// Static evaluation from White's point of view.
pub fn evaluate_white(pos: &Position, features: &EvalFeatures) -> i32 {
    let ph = phase(pos);
    side_terms(pos, Color::White, features, ph) - side_terms(pos, Color::Black, features, ph)
}

/// Full-featured evaluation, used by tests and tooling.
pub fn eval_cp(pos: &Position) -> i32 { evaluate(pos, &EvalFeatures::ALL) }

fn relative_rank(color: Color, sq: Square) -> i32 {
    color.relative_rank(sq.rank()).to_u32() as i32
}

fn side_terms(pos: &Position, color: Color, f: &EvalFeatures, ph: Phase) -> i32 {
    let board = pos.chess().board();
    let ours = board.by_color(color);
    let mut score = material_of(board, color);

    if ph == Phase::Opening { score += center_control(board, color); }
    if ph != Phase::Endgame { score -= king_exposure(board, color); }

    if f.development && ph == Phase::Opening { score += development(board, color); }

    if f.knight_rim {
        let rim = Bitboard::from_file(File::A) | Bitboard::from_file(File::H);
        let knights = ours & board.knights();
        score -= (knights & rim).count() as i32 * 20;
        score -= (knights & Bitboard::CORNERS).count() as i32 * 10;
    }

    if f.bishop_pair && (ours & board.bishops()).count() >= 2 { score += BISHOP_PAIR_BONUS; }

    if f.rook_open_file {
        for sq in ours & board.rooks() {
            let file_bb = Bitboard::from_file(sq.file());
            if (file_bb & board.pawns()).is_empty() {
                score += ROOK_OPEN_FILE_BONUS;
            } else if (file_bb & board.pawns() & ours).is_empty() {
                score += ROOK_HALF_OPEN_FILE_BONUS;
            }
        }
    }

    if f.passed_pawns {
        let their_pawns = board.pawns() & board.by_color(!color);
        for sq in ours & board.pawns() {
            if is_passed(sq, color, their_pawns) {
                let advancement = (relative_rank(color, sq) - 1).max(0);
                score += PASSED_PAWN_BASE + advancement * PASSED_PAWN_PER_RANK;
            }
        }
    }

    if f.mobility {
        for sq in ours & !board.pawns() & !board.kings() {
            let reach = (board.attacks_from(sq) & !ours).count() as i32;
            score += match board.role_at(sq) {
                Some(Role::Knight) => reach * 4,
                Some(Role::Bishop) => reach * 5,
                Some(Role::Rook) => reach * 2,
                Some(Role::Queen) => reach,
                _ => 0,
            };
        }
    }

    score
}

fn center_control(board: &Board, color: Color) -> i32 {
    let ours = board.by_color(color);
    let mut score = (ours & board.pawns() & Bitboard::CENTER).count() as i32 * 20;
    for sq in ours & !board.kings() {
        score += (board.attacks_from(sq) & Bitboard::CENTER).count() as i32 * 8;
    }
    score
}

fn king_exposure(board: &Board, color: Color) -> i32 {
    let Some(king) = board.king_of(color) else { return 0 };
    let our_pawns = board.pawns() & board.by_color(color);
    let mut penalty = 0;

    // Pawn shield one rank ahead of a king still near its back rank
    if relative_rank(color, king) <= 1 {
        let forward = if color == Color::White { 8 } else { -8 };
        if let Some(front) = king.offset(forward) {
            let mut shield = Bitboard::from_square(front);
            if let Some(sq) = front.offset(-1).filter(|s| s.rank() == front.rank()) { shield.add(sq); }
            if let Some(sq) = front.offset(1).filter(|s| s.rank() == front.rank()) { shield.add(sq); }
            let missing = shield.count() as i32 - (shield & our_pawns).count() as i32;
            penalty += missing * 12;
        }
    }

    if (Bitboard::from_file(king.file()) & our_pawns).is_empty() { penalty += 15; }

    let zone = attacks::king_attacks(king);
    let mut pressure = 0;
    for sq in zone {
        pressure += board.attacks_to(sq, !color, board.occupied()).count() as i32;
    }
    penalty + pressure * 6
}

fn development(board: &Board, color: Color) -> i32 {
    let ours = board.by_color(color);
    let back = Bitboard::from_rank(color.backrank());
    let minors_home = (ours & back & (board.knights() | board.bishops())).count() as i32;
    let mut score = -15 * minors_home;

    let queen_home = match color {
        Color::White => Square::D1,
        Color::Black => Square::D8,
    };
    let queen_out = (ours & board.queens()).any() && !(ours & board.queens()).contains(queen_home);
    if queen_out && minors_home >= 2 { score -= 20; }

    if let Some(king) = board.king_of(color) {
        if king.rank() == color.backrank() && (king.file() == File::G || king.file() == File::C) {
            score += 25;
        }
    }
    score
}

fn is_passed(sq: Square, color: Color, their_pawns: Bitboard) -> bool {
    let file = sq.file().to_u32() as i32;
    let rank = sq.rank().to_u32() as i32;
    for bsq in their_pawns {
        let bf = bsq.file().to_u32() as i32;
        if (bf - file).abs() > 1 { continue; }
        let br = bsq.rank().to_u32() as i32;
        let ahead = if color == Color::White { br > rank } else { br < rank };
        if ahead { return false; }
    }
    true
}

/// Quick incremental score of `mv` for ordering, in centipawns from the
/// mover's perspective: change in static evaluation, a check bonus, the
/// early queen trade penalty and the material the opponent can win back on
/// the landing square.
pub fn evaluate_move(pos: &Position, mv: Move, features: &EvalFeatures) -> i32 {
    let before = evaluate(pos, features);
    let child = pos.play(mv);
    let after = -evaluate(&child, features);
    let mut score = after - before;

    if child.in_check() { score += CHECK_BONUS; }

    if features.early_queen_trade
        && phase(pos) == Phase::Opening
        && mv.role() == Role::Queen
        && mv.capture() == Some(Role::Queen)
    {
        let recapturable = child.chess().board().attacks_to(mv.to(), child.turn(), child.chess().board().occupied()).any();
        if recapturable { score -= EARLY_QUEEN_TRADE_PENALTY; }
    }

    match see::see_gain_cp(pos, mv) {
        Some(gain) => {
            // Static delta already credits the victim; charge the recapture loss
            let victim = mv.capture().map(role_value).unwrap_or(0);
            if gain < victim { score -= victim - gain; }
        }
        None => score -= see::exposure_after_move(pos, mv),
    }
    score
}

/// Cheap ordering key (MVV-LVA plus promotions) for interior nodes.
pub fn mvv_lva(mv: Move) -> i32 {
    let victim = mv.capture().map(role_value).unwrap_or(0);
    let promo = mv.promotion().map(role_value).unwrap_or(0);
    let attacker = if mv.role() == Role::King { 0 } else { role_value(mv.role()) };
    if victim == 0 && promo == 0 { return 0; }
    victim * 10 - attacker + promo * 10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(fen: &str) -> Position { Position::from_fen(fen).expect("valid fen") }

    #[test]
    fn startpos_is_balanced() {
        assert_eq!(eval_cp(&Position::startpos()), 0);
    }

    #[test]
    fn evaluation_is_symmetric_in_side_to_move() {
        let w = pos("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3");
        let white_view = evaluate_white(&w, &EvalFeatures::ALL);
        assert_eq!(evaluate(&w, &EvalFeatures::ALL), white_view);
    }

    #[test]
    fn bishop_pair_counts_only_when_enabled() {
        let p = pos("4k3/8/8/8/8/8/8/2B1KB2 w - - 0 40");
        let mut with = EvalFeatures::NONE;
        with.bishop_pair = true;
        assert_eq!(evaluate(&p, &with) - evaluate(&p, &EvalFeatures::NONE), BISHOP_PAIR_BONUS);
    }

    #[test]
    fn passed_pawn_bonus_grows_with_rank() {
        let mut f = EvalFeatures::NONE;
        f.passed_pawns = true;
        let far = evaluate(&pos("4k3/8/1P6/8/8/8/8/4K3 w - - 0 40"), &f);
        let near = evaluate(&pos("4k3/8/8/8/8/1P6/8/4K3 w - - 0 40"), &f);
        assert!(far > near, "advanced passer {far} should beat {near}");
    }

    #[test]
    fn mvv_lva_prefers_bigger_victims() {
        let p = pos("4k3/8/8/3q4/8/3r4/2P5/3RK3 w - - 0 1");
        let pxd3 = p.parse_uci("c2d3").unwrap();
        let rxd3 = p.parse_uci("d1d3").unwrap();
        assert!(mvv_lva(pxd3) > mvv_lva(rxd3));
        assert_eq!(mvv_lva(p.parse_uci("e1f2").unwrap()), 0);
    }
}
