use anyhow::{bail, Result};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use shakmaty::Color;

use chesschat_engine::board::Position;
use chesschat_engine::book::standard_lines;
use chesschat_engine::search::pipeline::Terminal;
use chesschat_engine::{Engine, EngineConfig, SearchRequest, SearchSource};

#[derive(Parser, Debug)]
#[command(name = "chesschat-selfplay", about = "Play one difficulty level against another and report the score")]
struct Args {
    #[arg(long, default_value_t = 5)]
    white_level: i64,
    #[arg(long, default_value_t = 1)]
    black_level: i64,
    #[arg(long, default_value_t = 10)]
    games: usize,
    #[arg(long, default_value_t = 160)]
    max_plies: usize,
    #[arg(long, default_value_t = 200)]
    budget_ms: u64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Swap colours every other game (`--alternate false` to keep them fixed)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    alternate: bool,
    /// Start each game from a book line (cycled), played `opening_plies` deep
    #[arg(long, default_value_t = 0)]
    opening_plies: usize,
}

#[derive(Debug, Default)]
struct Tally {
    wins_a: usize,
    wins_b: usize,
    draws: usize,
    fallbacks: usize,
    moves: usize,
}

enum Outcome {
    Win(Color),
    Draw,
}

fn play_game(engine: &Engine, args: &Args, game: usize, tally: &mut Tally) -> Result<(Outcome, bool)> {
    let swapped = args.alternate && game % 2 == 1;
    let (white, black) = if swapped { (args.black_level, args.white_level) } else { (args.white_level, args.black_level) };

    let mut history: Vec<String> = Vec::new();
    if args.opening_plies > 0 {
        let lines = standard_lines();
        let line = &lines[game % lines.len()];
        history.extend(line.moves.iter().take(args.opening_plies).cloned());
    }
    let mut pos = Position::from_start_and_moves(&history)?;

    for ply in 0..args.max_plies {
        let level = if pos.turn() == Color::White { white } else { black };
        let req = SearchRequest::new(pos.fen(), level, args.budget_ms)
            .with_history(history.clone())
            .with_seed(args.seed.wrapping_add((game * 1000 + ply) as u64));
        let result = engine.compute_blocking(req)?;
        if result.source == SearchSource::Fallback { tally.fallbacks += 1; }
        match result.terminal {
            Some(Terminal::Checkmate) => return Ok((Outcome::Win(!pos.turn()), swapped)),
            Some(Terminal::Stalemate) => return Ok((Outcome::Draw, swapped)),
            None => {}
        }
        let Some(uci) = result.best_move else { bail!("no move returned in non-terminal position {}", pos.fen()) };
        pos = pos.play_uci(&uci)?;
        history.push(uci);
        tally.moves += 1;
        if pos.halfmoves() >= 100 || pos.is_insufficient_material() {
            return Ok((Outcome::Draw, swapped));
        }
    }
    Ok((Outcome::Draw, swapped))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let engine = Engine::new(EngineConfig::default())?;

    let pb = ProgressBar::new(args.games as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} games {msg}")?);

    let mut tally = Tally::default();
    for g in 0..args.games {
        let (outcome, swapped) = play_game(&engine, &args, g, &mut tally)?;
        // Level A is `white_level`, whichever colour it had this game
        let a_color = if swapped { Color::Black } else { Color::White };
        match outcome {
            Outcome::Win(c) if c == a_color => tally.wins_a += 1,
            Outcome::Win(_) => tally.wins_b += 1,
            Outcome::Draw => tally.draws += 1,
        }
        pb.set_message(format!("+{} ={} -{}", tally.wins_a, tally.draws, tally.wins_b));
        pb.inc(1);
    }
    pb.finish();

    let score = tally.wins_a as f64 + 0.5 * tally.draws as f64;
    println!(
        "level {} vs level {}: +{} ={} -{} (score {:.1}/{}), {} moves, {} fallbacks",
        args.white_level, args.black_level, tally.wins_a, tally.draws, tally.wins_b, score, args.games, tally.moves, tally.fallbacks
    );
    Ok(())
}
