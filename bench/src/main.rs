//! Benchmark runner that times every configured query over the tier × regime
//! matrix, prints a table per query and writes one chart per query.
//!
//! With no `OLIST_*` variables set it expects `A3Small.db`, `A3Medium.db` and
//! `A3Large.db` in the working directory (see `build-db`).
//!
//! Usage:
//!   cargo run --release --bin olist-bench
//!   OLIST_TIERS=small OLIST_QUERIES=q1 cargo run --release --bin olist-bench

use anyhow::{bail, Result};
use olist_bench::query::BenchQuery;
use olist_bench::report::{print_report, write_chart};
use olist_bench::runner::{run_matrix, RunOptions};
use olist_core::BenchConfig;
use std::process;

fn run(config: &BenchConfig) -> Result<()> {
    let mut queries = Vec::with_capacity(config.queries.len());
    for name in &config.queries {
        match BenchQuery::by_name(name) {
            Some(query) => queries.push(query),
            None => bail!("unknown query '{name}'"),
        }
    }

    let options = RunOptions {
        trials: config.trials,
        seed: config.seed,
    };

    for query in &queries {
        println!(
            "Benchmarking {} ({} trials per configuration)...",
            query.name, options.trials
        );
        let report = run_matrix(&config.db_dir, &config.tiers, query, &options)?;
        print_report(&report);

        let chart = config.chart_dir.join(format!("{}_chart.svg", query.name));
        write_chart(&report, &chart, config.chart_ceiling_ms)?;
        log::info!("wrote {}", chart.display());
    }
    Ok(())
}

fn main() {
    let config = BenchConfig::from_env();

    olist_core::initialize_logger(config.log_level, config.log_file.as_deref())
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize logger: {e:#}. Exiting.");
            process::exit(1);
        });

    log::info!(
        "olist-bench starting (db_dir={}, tiers={:?}, trials={})",
        config.db_dir.display(),
        config.tiers,
        config.trials
    );

    if let Err(e) = run(&config) {
        log::error!("benchmark aborted: {e:#}");
        process::exit(1);
    }
}
