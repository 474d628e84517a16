//! Criterion benchmark harness: measures single-trial latency of each
//! benchmark query under each optimization regime on synthetic data.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use olist_bench::populate::{generate_synthetic, populate, SyntheticParams};
use olist_bench::query::{BenchQuery, ALL_QUERIES};
use olist_bench::session::BenchSession;
use olist_core::Regime;
use std::time::Duration;

/// Open an in-memory session, populate it and put it into `regime`.
fn setup_session(params: &SyntheticParams, query: &BenchQuery, regime: Regime) -> BenchSession {
    let mut session = BenchSession::open_in_memory()
        .expect("Failed to open in-memory SQLite")
        .with_seed(42);
    let data = generate_synthetic(params);
    populate(session.connection_mut(), &data).expect("Failed to populate");

    if let Some(view) = &query.view {
        session.create_view(view).expect("Failed to create view");
    }
    session
        .set_automatic_index(regime.automatic_index())
        .expect("Failed to set automatic_index");
    if !regime.keys_enabled() {
        session.disable_keys().expect("Failed to disable keys");
    }
    if regime.user_indexes() {
        session
            .create_indexes(&query.indexes)
            .expect("Failed to create indexes");
    }
    session
}

fn bench_queries(c: &mut Criterion) {
    let params = SyntheticParams::standard();

    for query in ALL_QUERIES {
        let mut group = c.benchmark_group(format!("query/{}", query.name));
        group.measurement_time(Duration::from_secs(20));
        group.sample_size(50);

        for regime in Regime::ALL {
            let mut session = setup_session(&params, &query, regime);

            let id = BenchmarkId::from_parameter(regime.name());
            group.bench_with_input(id, &query, |b, query| {
                b.iter(|| {
                    session.run_trial(query).expect("trial failed");
                });
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
