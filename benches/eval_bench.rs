use criterion::{criterion_group, criterion_main, Criterion, black_box};
use chesschat_engine::board::Position;
use chesschat_engine::search::eval::{evaluate, evaluate_move, EvalFeatures};

const MIDDLEGAME: &str = "r2q1rk1/ppp2ppp/2np1n2/2b1p1B1/2B1P1b1/2NP1N2/PPP2PPP/R2Q1RK1 w - - 4 8";

fn bench_eval(c: &mut Criterion) {
    let start = Position::startpos();
    let mid = Position::from_fen(MIDDLEGAME).unwrap();
    c.bench_function("evaluate_startpos_all", |ben| {
        ben.iter(|| black_box(evaluate(black_box(&start), &EvalFeatures::ALL)))
    });
    c.bench_function("evaluate_middlegame_none", |ben| {
        ben.iter(|| black_box(evaluate(black_box(&mid), &EvalFeatures::NONE)))
    });
    let moves = mid.legal_moves();
    c.bench_function("evaluate_move_middlegame_all_moves", |ben| {
        ben.iter(|| {
            let s: i32 = moves.iter().map(|&m| evaluate_move(&mid, m, &EvalFeatures::ALL)).sum();
            black_box(s)
        })
    });
}

criterion_group!(benches, bench_eval);
criterion_main!(benches);
