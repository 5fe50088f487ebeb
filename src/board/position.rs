use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position as _};

use crate::error::EngineError;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Immutable chess position. Every move produces a new `Position`; legality
/// always comes from the rules backend, never from this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pos: Chess,
}

impl Default for Position {
    fn default() -> Self { Self::startpos() }
}

impl Position {
    pub fn startpos() -> Self {
        Self { pos: Chess::default() }
    }

    /// Parses a FEN. Four-field EPD strings are padded with `0 1`. Bad castling
    /// rights or en passant squares are repaired rather than rejected; any other
    /// inconsistency is an `InvalidPosition`.
    pub fn from_fen(fen: &str) -> Result<Self, EngineError> {
        let raw = fen.trim();
        if raw.is_empty() { return Err(EngineError::InvalidPosition("empty FEN".to_string())); }
        let parts: Vec<&str> = raw.split_whitespace().collect();
        let padded = match parts.len() {
            4 => format!("{} 0 1", parts.join(" ")),
            5 => format!("{} 1", parts.join(" ")),
            _ => parts.join(" "),
        };
        let parsed: Fen = padded
            .parse()
            .map_err(|e| EngineError::InvalidPosition(format!("FEN error: {e}")))?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .or_else(|e| e.ignore_invalid_castling_rights())
            .or_else(|e| e.ignore_invalid_ep_square())
            .map_err(|e| EngineError::InvalidPosition(format!("illegal setup: {e}")))?;
        Ok(Self { pos })
    }

    pub fn chess(&self) -> &Chess { &self.pos }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.pos, EnPassantMode::Legal).to_string()
    }

    pub fn turn(&self) -> Color { self.pos.turn() }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.pos.legal_moves().into_iter().collect()
    }

    pub fn in_check(&self) -> bool { self.pos.is_check() }

    pub fn is_checkmate(&self) -> bool { self.pos.is_checkmate() }

    pub fn is_stalemate(&self) -> bool { self.pos.is_stalemate() }

    /// Plays a move taken from `legal_moves()` of this same position.
    pub fn play(&self, mv: Move) -> Position {
        let mut next = self.pos.clone();
        next.play_unchecked(mv);
        Position { pos: next }
    }

    /// Resolves a UCI string (`e2e4`, `e7e8q`, castling as `e1g1` or `e1h1`)
    /// to a legal move in this position.
    pub fn parse_uci(&self, uci: &str) -> Option<Move> {
        let parsed: UciMove = uci.trim().parse().ok()?;
        parsed.to_move(&self.pos).ok()
    }

    pub fn play_uci(&self, uci: &str) -> Result<Position, EngineError> {
        let mv = self
            .parse_uci(uci)
            .ok_or_else(|| EngineError::InvalidPosition(format!("Illegal move: {uci}")))?;
        Ok(self.play(mv))
    }

    pub fn from_start_and_moves(moves: &[String]) -> Result<Self, EngineError> {
        let mut pos = Self::startpos();
        for m in moves { pos = pos.play_uci(m)?; }
        Ok(pos)
    }

    /// Plies played since the standard starting position, derived from the
    /// fullmove counter.
    pub fn ply_count(&self) -> u32 {
        let full = self.pos.fullmoves().get();
        (full - 1) * 2 + if self.turn() == Color::Black { 1 } else { 0 }
    }

    pub fn fullmoves(&self) -> u32 { self.pos.fullmoves().get() }

    pub fn halfmoves(&self) -> u32 { self.pos.halfmoves() }

    pub fn is_insufficient_material(&self) -> bool { self.pos.is_insufficient_material() }

    /// Side to move passes. `None` when in check (a null move would be illegal).
    pub fn null_move(&self) -> Option<Position> {
        if self.in_check() { return None; }
        self.pos.clone().swap_turn().ok().map(|pos| Position { pos })
    }
}

/// Standard UCI rendering; castling is written as the king's two-square move.
pub fn move_to_uci(mv: Move) -> String {
    UciMove::from_standard(mv).to_string()
}
