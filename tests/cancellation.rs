use chesschat_engine::{Engine, EngineConfig, EngineError, SearchRequest};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const FEN: &str = "r1bq1rk1/pp2bppp/2n1pn2/2pp4/3P4/2PBPN2/PP1N1PPP/R2QK2R w KQ - 0 8";

fn engine() -> Engine {
    Engine::new(EngineConfig { worker_threads: 4, ..EngineConfig::default() }).unwrap()
}

#[test]
fn cancelled_request_never_delivers_and_others_finish() {
    let e = engine();
    let doomed = e.compute(SearchRequest::new(FEN, 5, 3000));
    let other = e.compute(SearchRequest::new(FEN, 2, 300));
    assert!(e.cancel(doomed.id()));

    let t0 = Instant::now();
    let id = doomed.id();
    assert_eq!(doomed.wait(), Err(EngineError::Cancelled(id)));
    assert!(t0.elapsed() < Duration::from_millis(1000), "cancel took {:?}", t0.elapsed());

    let r = other.wait().expect("independent request completes");
    assert!(r.best_move.is_some());
}

#[test]
fn cancel_all_stops_every_in_flight_request() {
    let e = engine();
    let handles: Vec<_> = (0..3).map(|_| e.compute(SearchRequest::new(FEN, 5, 3000))).collect();
    assert_eq!(e.cancel_all(), 3);
    for h in handles {
        assert!(matches!(h.wait(), Err(EngineError::Cancelled(_))));
    }
    // Workers drop their registry entries as they unwind
    let t0 = Instant::now();
    while e.in_flight() > 0 && t0.elapsed() < Duration::from_secs(2) {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(e.in_flight(), 0);
}

#[test]
fn callback_runs_for_completed_request_only() {
    let e = engine();
    let (tx, rx) = mpsc::channel();
    let tx2 = tx.clone();
    e.compute_with(SearchRequest::new(FEN, 1, 200), move |r| {
        let _ = tx.send(r.best_move);
    });
    let cancelled = e.compute_with(SearchRequest::new(FEN, 5, 3000), move |r| {
        let _ = tx2.send(r.best_move);
    });
    e.cancel(cancelled);

    let first = rx.recv_timeout(Duration::from_secs(2)).expect("completed request calls back");
    assert!(first.is_some());
    assert!(rx.recv_timeout(Duration::from_millis(1500)).is_err(), "cancelled request must stay silent");
}

#[test]
fn cancel_after_completion_is_a_no_op() {
    let e = engine();
    let h = e.compute(SearchRequest::new(FEN, 1, 200));
    let id = h.id();
    let r = h.wait().unwrap();
    assert!(r.best_move.is_some());
    let t0 = Instant::now();
    while e.in_flight() > 0 && t0.elapsed() < Duration::from_secs(1) {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!e.cancel(id));
}
