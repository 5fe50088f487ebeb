use chesschat_engine::{Engine, EngineConfig, SearchRequest};
use std::time::Instant;

// Busy middlegame: deep levels cannot finish their target depth quickly
const FEN: &str = "r1bq1rk1/pp2bppp/2n1pn2/2pp4/3P4/2PBPN2/PP1N1PPP/R2QK2R w KQ - 0 8";

#[test]
fn every_level_answers_within_budget_plus_grace() {
    let cfg = EngineConfig::default();
    let grace = cfg.grace_ms;
    let e = Engine::new(cfg).unwrap();
    let budget = 300;
    for p in e.profiles().levels() {
        let t0 = Instant::now();
        let r = e.compute_blocking(SearchRequest::new(FEN, p.level as i64, budget)).unwrap();
        let wall = t0.elapsed().as_millis() as u64;
        assert!(wall <= budget + grace + 25, "level {} took {} ms", p.level, wall);
        assert!(r.best_move.is_some());
        assert!(r.elapsed_ms <= budget + grace + 25);
    }
}

#[test]
fn levels_share_the_same_budget() {
    let e = Engine::new(EngineConfig::default()).unwrap();
    let lo = e.compute_blocking(SearchRequest::new(FEN, 1, 400)).unwrap();
    let hi = e.compute_blocking(SearchRequest::new(FEN, 5, 400)).unwrap();
    assert!(lo.elapsed_ms <= 400 + 300);
    assert!(hi.elapsed_ms <= 400 + 300);
    assert!(hi.depth_reached >= lo.depth_reached || !hi.complete);
}

#[test]
fn long_search_counts_slices() {
    let e = Engine::new(EngineConfig::default()).unwrap();
    let r = e.compute_blocking(SearchRequest::new(FEN, 5, 400)).unwrap();
    if r.elapsed_ms >= 100 {
        assert!(r.slice_count > 0, "no slices counted in {} ms", r.elapsed_ms);
    }
    assert!(r.nodes > 0);
}

#[test]
fn queued_request_falls_back_at_outer_deadline() {
    use chesschat_engine::book::NoHints;
    use chesschat_engine::search::difficulty::ProfileTable;
    use chesschat_engine::{SearchSource, board::Position};
    use std::sync::Arc;

    // One worker and a level that never stops deepening on its own
    let mut endless = ProfileTable::builtin().highest().clone();
    endless.min_depth = 1;
    endless.target_depth = 30;
    endless.hard_cap_depth = 30;
    let table = ProfileTable::from_profiles(vec![endless.clone()]).unwrap();
    let cfg = EngineConfig { worker_threads: 1, grace_ms: 100, ..EngineConfig::default() };
    let e = Engine::with_provider(cfg, Arc::new(table), Arc::new(NoHints)).unwrap();

    let busy = e.compute(SearchRequest::new(FEN, endless.level as i64, 3000));
    let t0 = Instant::now();
    let r = e.compute_blocking(SearchRequest::new(FEN, endless.level as i64, 200).with_seed(4)).unwrap();
    let wall = t0.elapsed().as_millis() as u64;

    assert_eq!(r.source, SearchSource::Fallback);
    assert!(r.error.is_some());
    assert!(!r.complete);
    assert!(wall <= 200 + 100 + 50, "queued request took {wall} ms");
    let mv = r.require_move().unwrap();
    assert!(Position::from_fen(FEN).unwrap().parse_uci(mv).is_some(), "{mv} is not legal");

    busy.cancel();
    assert!(matches!(busy.wait(), Err(chesschat_engine::EngineError::Cancelled(_))));
}
