//! Opening book and heuristic hints. The provider is a seam: the engine only
//! sees `HintProvider`, and any failure means "no advice".

use serde::{Deserialize, Serialize};
use shakmaty::{Move, Role};
use thiserror::Error;

use crate::board::Position;

/// Default ply count after which the book is no longer consulted.
pub const DEFAULT_PLY_THRESHOLD: u32 = 12;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintQuery {
    pub fen: String,
    #[serde(default)]
    pub move_history: Vec<String>,
    pub ply_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintTag {
    Center,
    Development,
    KingSafety,
    PawnStructure,
    Activity,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    #[serde(rename = "move")]
    pub uci: String,
    pub tag: HintTag,
    /// Relative weight in centipawns, added to the move's ordering score.
    pub weight: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HintResponse {
    Suggested {
        #[serde(rename = "move")]
        uci: String,
        name: Option<String>,
    },
    Hints { hints: Vec<Hint> },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookError {
    #[error("hint provider unavailable: {0}")]
    Unavailable(String),
    #[error("malformed hint response: {0}")]
    Malformed(String),
}

pub trait HintProvider: Send + Sync {
    fn query(&self, query: &HintQuery) -> Result<HintResponse, BookError>;
}

/// Provider that never has advice.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHints;

impl HintProvider for NoHints {
    fn query(&self, _query: &HintQuery) -> Result<HintResponse, BookError> { Ok(HintResponse::Empty) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningLine {
    pub name: String,
    pub moves: Vec<String>,
}

impl OpeningLine {
    fn new(name: &str, moves: &[&str]) -> Self {
        Self { name: name.to_string(), moves: moves.iter().map(|m| m.to_string()).collect() }
    }
}

pub fn standard_lines() -> Vec<OpeningLine> {
    vec![
        OpeningLine::new("Italian Game", &["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "f8c5", "e1g1", "g8f6"]),
        OpeningLine::new("Ruy Lopez", &["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6", "b5a4", "g8f6"]),
        OpeningLine::new("Queen's Gambit Declined", &["d2d4", "d7d5", "c2c4", "e7e6", "b1c3", "g8f6", "c1g5", "f8e7"]),
        OpeningLine::new("Sicilian Dragon", &["e2e4", "c7c5", "g1f3", "d7d6", "d2d4", "c5d4", "f3d4", "g8f6"]),
        OpeningLine::new("French Defense", &["e2e4", "e7e6", "d2d4", "d7d5", "b1c3", "f8b4", "e4e5", "c7c5"]),
        OpeningLine::new("King's Indian Defense", &["d2d4", "g8f6", "c2c4", "g7g6", "b1c3", "f8g7", "e2e4", "d7d6"]),
        OpeningLine::new("English Opening", &["c2c4", "e7e5", "b1c3", "g8f6", "g2g3", "d7d5", "c4d5", "f6d5"]),
        OpeningLine::new("Caro-Kann Defense", &["e2e4", "c7c6", "d2d4", "d7d5", "b1c3", "d5e4", "c3e4", "c8f5"]),
        OpeningLine::new("Scotch Game", &["e2e4", "e7e5", "g1f3", "b8c6", "d2d4", "e5d4", "f3d4", "f8c5"]),
        OpeningLine::new("Queen's Indian Defense", &["d2d4", "g8f6", "c2c4", "e7e6", "g1f3", "b7b6", "g2g3", "c8b7"]),
        OpeningLine::new("Nimzo-Indian Defense", &["d2d4", "g8f6", "c2c4", "e7e6", "b1c3", "f8b4", "e2e3", "e8g8"]),
        OpeningLine::new("Pirc Defense", &["e2e4", "d7d6", "d2d4", "g8f6", "b1c3", "g7g6", "f2f4", "f8g7"]),
        OpeningLine::new("Alekhine's Defense", &["e2e4", "g8f6", "e4e5", "f6d5", "d2d4", "d7d6", "g1f3", "c8g4"]),
        OpeningLine::new("Benoni Defense", &["d2d4", "g8f6", "c2c4", "c7c5", "d4d5", "e7e6", "b1c3", "e6d5"]),
        OpeningLine::new("Dutch Defense", &["d2d4", "f7f5", "g2g3", "g8f6", "f1g2", "e7e6", "g1f3", "f8e7"]),
        OpeningLine::new("Scandinavian Defense", &["e2e4", "d7d5", "e4d5", "d8d5", "b1c3", "d5a5", "d2d4", "g8f6"]),
        OpeningLine::new("Vienna Game", &["e2e4", "e7e5", "b1c3", "g8f6", "f2f4", "d7d5", "f4e5", "f6e4"]),
        OpeningLine::new("London System", &["d2d4", "d7d5", "g1f3", "g8f6", "c1f4", "c7c5", "e2e3", "b8c6"]),
        OpeningLine::new("Catalan Opening", &["d2d4", "g8f6", "c2c4", "e7e6", "g2g3", "d7d5", "f1g2", "f8e7"]),
    ]
}

/// Built-in book over well-known opening lines. A position is in book when
/// replaying a line's prefix reaches it (matched on placement, side to move
/// and castling rights). One continuation is suggested outright; several
/// become weighted hints.
#[derive(Debug, Clone)]
pub struct OpeningLines {
    lines: Vec<OpeningLine>,
    hint_weight: i32,
}

impl Default for OpeningLines {
    fn default() -> Self { Self::new(standard_lines()) }
}

impl OpeningLines {
    pub fn new(lines: Vec<OpeningLine>) -> Self { Self { lines, hint_weight: 30 } }

    pub fn len(&self) -> usize { self.lines.len() }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// (next move, line name) for every line passing through `pos`.
    fn continuations(&self, pos: &Position, history: &[String]) -> Result<Vec<(String, String)>, BookError> {
        let key = position_key(&pos.fen());
        let mut out = Vec::new();
        for line in &self.lines {
            // History, when given, must be a prefix of the line
            if !history.is_empty() {
                if history.len() < line.moves.len() && line.moves.starts_with(history) {
                    out.push((line.moves[history.len()].clone(), line.name.clone()));
                }
                continue;
            }
            let mut cur = Position::startpos();
            for (i, mv) in line.moves.iter().enumerate() {
                if position_key(&cur.fen()) == key {
                    out.push((mv.clone(), line.name.clone()));
                    break;
                }
                if i + 1 == line.moves.len() { break; }
                cur = cur
                    .play_uci(mv)
                    .map_err(|e| BookError::Malformed(format!("{} at {}: {}", line.name, mv, e)))?;
            }
        }
        Ok(out)
    }
}

impl HintProvider for OpeningLines {
    fn query(&self, query: &HintQuery) -> Result<HintResponse, BookError> {
        let pos = Position::from_fen(&query.fen).map_err(|e| BookError::Malformed(e.to_string()))?;
        let history: &[String] = if history_reaches(&query.move_history, &pos) {
            &query.move_history
        } else {
            log::debug!("move history does not reach {}; matching on the position alone", query.fen);
            &[]
        };
        let found = self.continuations(&pos, history)?;
        if found.is_empty() { return Ok(HintResponse::Empty); }

        let mut tally: Vec<(String, String, i32)> = Vec::new();
        for (mv, name) in found {
            match tally.iter_mut().find(|(m, _, _)| *m == mv) {
                Some(entry) => entry.2 += 1,
                None => tally.push((mv, name, 1)),
            }
        }
        if tally.len() == 1 {
            let (uci, name, _) = tally.remove(0);
            return Ok(HintResponse::Suggested { uci, name: Some(name) });
        }
        let hints = tally
            .into_iter()
            .map(|(uci, _, count)| {
                let tag = pos.parse_uci(&uci).map(|m| classify(&pos, m)).unwrap_or(HintTag::Activity);
                Hint { uci, tag, weight: self.hint_weight * count }
            })
            .collect();
        Ok(HintResponse::Hints { hints })
    }
}

// Empty history trivially agrees with any position
fn history_reaches(history: &[String], pos: &Position) -> bool {
    if history.is_empty() { return true; }
    Position::from_start_and_moves(history).map_or(false, |p| position_key(&p.fen()) == position_key(&pos.fen()))
}

// Placement, side to move and castling; clocks and en passant ignored
fn position_key(fen: &str) -> String {
    fen.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}

/// Which board feature a move mostly serves.
pub fn classify(pos: &Position, mv: Move) -> HintTag {
    if mv.is_castle() { return HintTag::KingSafety; }
    let to = mv.to();
    let central = shakmaty::Bitboard::CENTER.contains(to);
    match mv.role() {
        Role::Pawn if central => HintTag::Center,
        Role::Pawn => HintTag::PawnStructure,
        Role::Knight | Role::Bishop => {
            let from_home = mv.from().map_or(false, |f| f.rank() == pos.turn().backrank());
            if from_home { HintTag::Development } else { HintTag::Activity }
        }
        Role::King => HintTag::KingSafety,
        _ => HintTag::Activity,
    }
}
