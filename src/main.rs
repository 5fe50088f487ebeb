use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chesschat_engine::board::position::START_FEN;
use chesschat_engine::uci::UciEngine;
use chesschat_engine::{Engine, EngineConfig, SearchRequest};

#[derive(Parser, Debug)]
#[command(author, version, about = "Difficulty-scaled chess move search with blunder safety", long_about = None)]
struct Args {
    /// Engine config file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Difficulty profile table (JSON) overriding the built-in levels
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute one move and print the result as JSON
    Compute {
        #[arg(long, default_value = START_FEN)]
        fen: String,
        #[arg(long, default_value_t = 3)]
        level: i64,
        #[arg(long, default_value_t = 750)]
        budget_ms: u64,
        /// Moves played from the start position, for the opening book
        #[arg(long, num_args = 0.., value_delimiter = ' ')]
        moves: Vec<String>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        debug: bool,
        #[arg(long)]
        pretty: bool,
    },
    /// Speak a minimal UCI dialect on stdin/stdout
    Uci,
    /// Print the difficulty profile table as JSON
    Profiles,
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut cfg = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(p) = &args.profiles {
        cfg.profiles = Some(p.clone());
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let engine = Engine::new(load_config(&args)?)?;

    match args.command {
        Command::Compute { fen, level, budget_ms, moves, seed, debug, pretty } => {
            let mut req = SearchRequest::new(fen, level, budget_ms).with_debug(debug);
            if !moves.is_empty() { req = req.with_history(moves); }
            if let Some(s) = seed { req = req.with_seed(s); }
            let result = engine.compute_blocking(req)?;
            let json = if pretty { serde_json::to_string_pretty(&result)? } else { serde_json::to_string(&result)? };
            println!("{json}");
        }
        Command::Uci => {
            UciEngine::new(engine).run_loop()?;
        }
        Command::Profiles => {
            println!("{}", engine.profiles().to_json()?);
        }
    }
    Ok(())
}
