use criterion::{criterion_group, criterion_main, Criterion, black_box};
use chesschat_engine::board::Position;
use chesschat_engine::search::alphabeta::{SearchParams, Searcher};
use chesschat_engine::search::clock::SearchClock;
use chesschat_engine::search::difficulty::ProfileTable;
use std::time::Duration;

fn bench_search(c: &mut Criterion) {
    let pos = Position::from_fen("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3").unwrap();
    let root = pos.legal_moves();
    let table = ProfileTable::builtin();
    for level in [1u8, 3] {
        let Some(profile) = table.get(level) else { continue };
        let params = SearchParams::from_profile(profile);
        c.bench_function(&format!("search_level_{level}"), |ben| {
            ben.iter(|| {
                let mut s = Searcher::new(params);
                let mut clock = SearchClock::with_budget(Duration::from_secs(10));
                black_box(s.search(black_box(&pos), &root, &mut clock).nodes)
            })
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_search
}
criterion_main!(benches);
