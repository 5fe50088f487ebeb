use chesschat_engine::search::clock::StopReason;
use chesschat_engine::{Engine, EngineConfig, SearchRequest, SearchSource};

// (fen, the only mating move)
const MATES: &[(&str, &str)] = &[
    ("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", "a1a8"),
    ("r1bqkbnr/pppp1ppp/2n5/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4", "h5f7"),
    ("7k/8/6K1/8/8/8/8/R7 w - - 0 1", "a1a8"),
    ("4r1k1/5ppp/8/8/8/8/5PPP/6K1 b - - 0 1", "e8e1"),
];

#[test]
fn mate_in_one_is_played_at_every_level() {
    let e = Engine::new(EngineConfig::default()).unwrap();
    let levels: Vec<i64> = e.profiles().levels().map(|p| p.level as i64).collect();
    for (fen, mate) in MATES {
        for &level in &levels {
            let r = e.compute_blocking(SearchRequest::new(*fen, level, 500)).unwrap();
            assert_eq!(r.best_move.as_deref(), Some(*mate), "level {level} missed mate in {fen}");
            assert_eq!(r.source, SearchSource::TacticalSafe);
            assert_eq!(r.stop_reason, StopReason::Tactical);
            assert!(r.complete);
        }
    }
}

#[test]
fn mate_result_is_fast() {
    let e = Engine::new(EngineConfig::default()).unwrap();
    let r = e.compute_blocking(SearchRequest::new(MATES[0].0, 1, 2000)).unwrap();
    assert!(r.elapsed_ms < 500, "mate took {} ms", r.elapsed_ms);
}
