use shakmaty::{Move, Position as _};

use crate::board::Position;
use crate::search::eval::role_value;

/// Static exchange evaluation of a capture by swap-off over legal recaptures
/// on the target square. Net material in centipawns from the mover's side.
/// `None` for non-captures.
pub fn see_gain_cp(pos: &Position, mv: Move) -> Option<i32> {
    let captured = mv.capture()?;
    let to = mv.to();
    let mut gains: Vec<i32> = vec![role_value(captured)];
    let mut cur = pos.play(mv);
    let mut occupant_val = role_value(mv.promotion().unwrap_or(mv.role()));

    loop {
        // Least valuable attacker that recaptures on `to`
        let reply = cur
            .chess()
            .legal_moves()
            .into_iter()
            .filter(|m| m.to() == to && m.is_capture())
            .min_by_key(|m| role_value(m.role()));
        let Some(m2) = reply else { break };
        let last = gains.last().copied().unwrap_or(0);
        gains.push(occupant_val - last);
        occupant_val = role_value(m2.promotion().unwrap_or(m2.role()));
        cur = cur.play(m2);
    }

    // Fold back: each side may stop capturing when continuing loses
    for i in (0..gains.len().saturating_sub(1)).rev() {
        gains[i] = -std::cmp::max(-gains[i], gains[i + 1]);
    }
    Some(gains[0])
}

/// Material the opponent wins by its best capture on the square `mv` lands on,
/// measured with SEE in the position after `mv`. Zero when nothing is
/// profitably capturable there.
pub fn exposure_after_move(pos: &Position, mv: Move) -> i32 {
    let child = pos.play(mv);
    let landing = match mv {
        Move::Castle { king, rook } => {
            // The rook is the piece that can end up loose after castling
            let file = if king < rook { shakmaty::File::F } else { shakmaty::File::D };
            shakmaty::Square::from_coords(file, king.rank())
        }
        _ => mv.to(),
    };
    child
        .chess()
        .legal_moves()
        .into_iter()
        .filter(|m| m.to() == landing && m.is_capture())
        .filter_map(|m| see_gain_cp(&child, m))
        .max()
        .unwrap_or(0)
        .max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(pos: &Position, uci: &str) -> Move {
        pos.parse_uci(uci).unwrap_or_else(|| panic!("{uci} must be legal"))
    }

    #[test]
    fn see_detects_bad_exchange_rook_x_pawn_on_h7() {
        // After Rxh7, ...Kxh7 wins the rook; SEE must be negative.
        let pos = Position::from_fen("6k1/2R4p/6p1/8/6K1/6P1/8/8 w - - 3 38").unwrap();
        let see = see_gain_cp(&pos, find(&pos, "c7h7")).expect("capture has SEE");
        assert!(see < 0, "SEE should be negative for losing exchange, got {see}");
    }

    #[test]
    fn see_free_pawn_is_pawn_value() {
        let pos = Position::from_fen("4k3/8/8/3p4/8/8/8/3RK3 w - - 0 1").unwrap();
        assert_eq!(see_gain_cp(&pos, find(&pos, "d1d5")), Some(100));
    }

    #[test]
    fn quiet_move_has_no_see() {
        let pos = Position::startpos();
        assert_eq!(see_gain_cp(&pos, find(&pos, "e2e4")), None);
    }

    #[test]
    fn exposure_flags_knight_into_pawn_attack() {
        // Nc3?? walks into ...b4xc3
        let pos = Position::from_fen("4k3/8/8/8/1p6/8/8/1N2K3 w - - 0 1").unwrap();
        assert!(exposure_after_move(&pos, find(&pos, "b1c3")) >= 200);
        assert_eq!(exposure_after_move(&pos, find(&pos, "b1d2")), 0);
    }
}
