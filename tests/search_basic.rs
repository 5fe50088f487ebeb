use chesschat_engine::board::position::START_FEN;
use chesschat_engine::board::Position;
use chesschat_engine::{Engine, EngineConfig, SearchRequest, SearchSource};
use std::time::Instant;

const POSITIONS: &[&str] = &[
    START_FEN,
    "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
    "r2q1rk1/ppp2ppp/2np1n2/2b1p1B1/2B1P1b1/2NP1N2/PPP2PPP/R2Q1RK1 w - - 4 8",
    "8/5pk1/6p1/8/3R4/6P1/5PK1/2r5 b - - 0 40",
    "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
];

fn engine() -> Engine { Engine::new(EngineConfig::default()).expect("engine") }

#[test]
fn start_position_lowest_tier_returns_searched_move() {
    let e = engine();
    let lowest = e.profiles().lowest().clone();
    let t0 = Instant::now();
    let r = e.compute_blocking(SearchRequest::new(START_FEN, lowest.level as i64, 750)).unwrap();
    let wall = t0.elapsed().as_millis() as u64;
    assert!(wall <= 1050, "took {wall} ms");
    assert!(matches!(r.source, SearchSource::Search | SearchSource::TacticalSafe), "source {:?}", r.source);
    assert!(r.depth_reached >= lowest.min_depth, "depth {} < {}", r.depth_reached, lowest.min_depth);
    let mv = r.require_move().unwrap();
    assert!(Position::startpos().parse_uci(mv).is_some(), "{mv} is not legal");
}

#[test]
fn every_level_returns_a_legal_move() {
    let e = engine();
    let levels: Vec<i64> = e.profiles().levels().map(|p| p.level as i64).collect();
    for fen in POSITIONS {
        let pos = Position::from_fen(fen).unwrap();
        for &level in &levels {
            let r = e.compute_blocking(SearchRequest::new(*fen, level, 250).with_seed(11)).unwrap();
            let mv = r.best_move.as_deref().unwrap_or_else(|| panic!("no move at level {level} for {fen}"));
            assert!(pos.parse_uci(mv).is_some(), "illegal {mv} at level {level} for {fen}");
        }
    }
}

#[test]
fn out_of_range_levels_are_clamped() {
    let e = engine();
    for level in [-4, 0, 99] {
        let r = e.compute_blocking(SearchRequest::new(START_FEN, level, 200)).unwrap();
        assert!(r.best_move.is_some(), "level {level} produced no move");
    }
}

#[test]
fn wins_free_queen_at_strong_level() {
    let e = engine();
    let r = e.compute_blocking(SearchRequest::new("4k3/8/8/3q4/8/8/3R4/4K3 w - - 0 1", 5, 500)).unwrap();
    assert_eq!(r.best_move.as_deref(), Some("d2d5"));
    assert_eq!(r.source, SearchSource::Search);
}
