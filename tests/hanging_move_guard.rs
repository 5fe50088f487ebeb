use chesschat_engine::board::Position;
use chesschat_engine::search::difficulty::GateTier;
use chesschat_engine::search::eval::EvalFeatures;
use chesschat_engine::search::gate::apply_gate;
use chesschat_engine::search::tactics::{filter_safe, RejectReason, TacticalScanner};
use chesschat_engine::{Engine, EngineConfig, SearchRequest};

// Every legal move interposes the queen against the rook check and loses it
const ALL_MOVES_HANG: &str = "k7/8/8/8/8/3Q4/6PP/r6K w - - 0 1";

#[test]
fn queen_blunder_is_rejected_and_reported() {
    let e = Engine::new(EngineConfig::default()).unwrap();
    let req = SearchRequest::new("4k3/8/4p3/8/8/8/8/3QK3 w - - 0 1", 1, 300).with_debug(true);
    let r = e.compute_blocking(req).unwrap();
    assert_ne!(r.best_move.as_deref(), Some("d1d5"));
    assert!(r.tactical_safety.rejected_count >= 1);
    assert!(r.tactical_safety.reasons.contains(&RejectReason::HangsQueen));
    let debug = r.debug.expect("debug info requested");
    assert!(debug.rejected.iter().any(|c| c.uci == "d1d5"));
}

#[test]
fn safety_valve_still_returns_a_legal_move() {
    let pos = Position::from_fen(ALL_MOVES_HANG).unwrap();
    assert_eq!(pos.legal_moves().len(), 3);

    let (scored, _) = TacticalScanner::default().score_moves(&pos, &pos.legal_moves(), &EvalFeatures::ALL);
    for tier in [GateTier::Beginner, GateTier::Intermediate, GateTier::Advanced] {
        let out = apply_gate(&scored, tier);
        assert!(out.safety_valve_used, "{tier:?} should fall back to all moves");
        assert_eq!(out.allowed.len(), 3);
    }

    let e = Engine::new(EngineConfig::default()).unwrap();
    for level in 1..=5 {
        let r = e.compute_blocking(SearchRequest::new(ALL_MOVES_HANG, level, 300)).unwrap();
        let mv = r.require_move().unwrap();
        assert!(pos.parse_uci(mv).is_some(), "level {level} returned illegal {mv}");
        assert!(r.tactical_safety.safety_valve_used);
    }
}

#[test]
fn filter_flags_moves_that_allow_back_rank_mate() {
    let pos = Position::from_fen(ALL_MOVES_HANG).unwrap();
    let report = filter_safe(&pos, &pos.legal_moves());
    assert!(report.safe.is_empty());
    assert!(report.rejected.iter().all(|r| r.reason == RejectReason::AllowsMateIn1));
}

#[test]
fn losing_rook_capture_is_filtered() {
    // Rxh7?? Kxh7
    let pos = Position::from_fen("6k1/2R4p/6p1/8/6K1/6P1/8/8 w - - 3 38").unwrap();
    let rxh7 = pos.parse_uci("c7h7").unwrap();
    let report = filter_safe(&pos, &pos.legal_moves());
    assert!(report.rejected.iter().any(|r| r.mv == rxh7));
}
