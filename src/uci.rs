// Minimal UCI front-end over the host; enough for GUIs and scripted matches
use std::io::{self, BufRead, Write};

use crate::board::Position;
use crate::error::EngineError;
use crate::host::Engine;
use crate::search::pipeline::{SearchRequest, SearchResult};

const DEFAULT_MOVETIME_MS: u64 = 1000;

pub struct UciEngine {
    engine: Engine,
    pos: Position,
    history: Option<Vec<String>>,
    level: i64,
}

impl UciEngine {
    pub fn new(engine: Engine) -> Self {
        let level = engine.profiles().highest().level as i64;
        Self { engine, pos: Position::startpos(), history: Some(Vec::new()), level }
    }

    pub fn position(&self) -> &Position { &self.pos }

    pub fn level(&self) -> i64 { self.level }

    fn cmd_uci(&self, out: &mut impl Write) -> io::Result<()> {
        let lo = self.engine.profiles().lowest().level;
        let hi = self.engine.profiles().highest().level;
        writeln!(out, "id name ChessChat Engine")?;
        writeln!(out, "id author ChessChat Team")?;
        writeln!(out, "option name Difficulty type spin default {} min {} max {}", self.level, lo, hi)?;
        writeln!(out, "uciok")
    }

    fn cmd_ucinewgame(&mut self) {
        self.pos = Position::startpos();
        self.history = Some(Vec::new());
    }

    /// `setoption name Difficulty value N`
    fn cmd_setoption(&mut self, args: &str) {
        let tokens: Vec<&str> = args.split_whitespace().collect();
        let name = tokens.iter().position(|t| *t == "name").and_then(|i| tokens.get(i + 1));
        let value = tokens.iter().position(|t| *t == "value").and_then(|i| tokens.get(i + 1));
        if let (Some(name), Some(value)) = (name, value) {
            if name.eq_ignore_ascii_case("difficulty") {
                if let Ok(v) = value.parse::<i64>() { self.level = v; }
            }
        }
    }

    /// `position startpos [moves ...]` or `position fen <fen> [moves ...]`
    pub fn cmd_position(&mut self, args: &str) -> Result<(), EngineError> {
        let (base, moves) = match args.split_once(" moves ") {
            Some((b, m)) => (b.trim(), m.split_whitespace().map(String::from).collect::<Vec<_>>()),
            None => (args.trim().trim_end_matches(" moves"), Vec::new()),
        };
        let (mut pos, from_start) = if base == "startpos" {
            (Position::startpos(), true)
        } else if let Some(fen) = base.strip_prefix("fen ") {
            (Position::from_fen(fen)?, false)
        } else {
            return Err(EngineError::InvalidPosition(format!("unsupported position command: {args}")));
        };
        for m in &moves {
            pos = pos.play_uci(m)?;
        }
        self.pos = pos;
        self.history = if from_start { Some(moves) } else { None };
        Ok(())
    }

    /// `go [movetime T] [depth N]`. Depth picks the weakest level that can
    /// reach it; the time budget is never changed by the level.
    fn request_for_go(&self, args: &str) -> SearchRequest {
        let mut movetime = DEFAULT_MOVETIME_MS;
        let mut level = self.level;
        let mut tokens = args.split_whitespace();
        while let Some(tok) = tokens.next() {
            match tok {
                "movetime" => {
                    if let Some(t) = tokens.next().and_then(|s| s.parse::<u64>().ok()) { movetime = t; }
                }
                "depth" => {
                    if let Some(d) = tokens.next().and_then(|s| s.parse::<u32>().ok()) {
                        let profiles = self.engine.profiles();
                        let fit = profiles.levels().find(|p| p.hard_cap_depth >= d).unwrap_or(profiles.highest());
                        level = fit.level as i64;
                    }
                }
                _ => {}
            }
        }
        let mut req = SearchRequest::new(self.pos.fen(), level, movetime);
        if let Some(h) = &self.history { req = req.with_history(h.clone()); }
        req
    }

    fn report(out: &mut impl Write, r: &SearchResult) -> io::Result<()> {
        writeln!(out, "info depth {} score cp {} nodes {} time {}", r.depth_reached, r.score_cp, r.nodes, r.elapsed_ms)?;
        writeln!(out, "bestmove {}", r.best_move.as_deref().unwrap_or("0000"))
    }

    /// Handles one command line. Returns false on `quit`.
    pub fn handle_line(&mut self, line: &str, out: &mut impl Write) -> io::Result<bool> {
        let line = line.trim();
        match line {
            "" => {}
            "uci" => self.cmd_uci(out)?,
            "isready" => writeln!(out, "readyok")?,
            "ucinewgame" => self.cmd_ucinewgame(),
            "quit" => return Ok(false),
            // go is synchronous, so there is never a search to stop
            "stop" => {}
            _ => {
                if let Some(rest) = line.strip_prefix("position ") {
                    if let Err(e) = self.cmd_position(rest) {
                        writeln!(out, "info string {e}")?;
                    }
                } else if let Some(rest) = line.strip_prefix("setoption ") {
                    self.cmd_setoption(rest);
                } else if line == "go" || line.starts_with("go ") {
                    let req = self.request_for_go(line.trim_start_matches("go"));
                    match self.engine.compute_blocking(req) {
                        Ok(r) => Self::report(out, &r)?,
                        Err(e) => {
                            writeln!(out, "info string {e}")?;
                            writeln!(out, "bestmove 0000")?;
                        }
                    }
                } else {
                    log::debug!("ignoring unknown command: {}", line);
                }
            }
        }
        out.flush()?;
        Ok(true)
    }

    pub fn run_loop(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        for line in stdin.lock().lines() {
            let line = line?;
            let mut out = stdout.lock();
            if !self.handle_line(&line, &mut out)? { break; }
        }
        Ok(())
    }
}
