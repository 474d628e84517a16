//! Build the tier databases from the Olist CSV extracts.
//!
//! Usage:
//!   cargo run --bin build-db [-- [--csv-dir <path>] [--db-dir <path>] [--seed <n>] [--tier <name>]...]
//!
//! Defaults come from `OLIST_CSV_DIR`, `OLIST_DB_DIR`, `OLIST_BUILD_SEED` and
//! `OLIST_TIERS` (all tiers, seed 72, current directory when unset).
//! Existing tier files are rebuilt in place, which also clears any state a
//! crashed benchmark left behind.

use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use olist_bench::populate::{build_database, sample_tiers};
use olist_bench::source::SourceData;
use olist_core::{BenchConfig, Tier};

const USAGE: &str =
    "Usage: build-db [--csv-dir <path>] [--db-dir <path>] [--seed <n>] [--tier <name>]...";

fn next_value(args: &[String], i: &mut usize, flag: &str) -> String {
    *i += 1;
    if *i >= args.len() {
        eprintln!("Error: {flag} requires an argument");
        eprintln!("{USAGE}");
        process::exit(1);
    }
    args[*i].clone()
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut config = BenchConfig::from_env();

    // Parse simple CLI flags
    let mut tiers: Vec<Tier> = Vec::new();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--csv-dir" => config.csv_dir = PathBuf::from(next_value(&args, &mut i, "--csv-dir")),
            "--db-dir" => config.db_dir = PathBuf::from(next_value(&args, &mut i, "--db-dir")),
            "--seed" => {
                let raw = next_value(&args, &mut i, "--seed");
                config.build_seed = raw.parse().unwrap_or_else(|_| {
                    eprintln!("Error: --seed expects an unsigned integer, got '{raw}'");
                    process::exit(1);
                });
            }
            "--tier" => {
                let raw = next_value(&args, &mut i, "--tier");
                match raw.parse::<Tier>() {
                    Ok(tier) => tiers.push(tier),
                    Err(e) => {
                        eprintln!("Error: {e}");
                        process::exit(1);
                    }
                }
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                return;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                eprintln!("{USAGE}");
                process::exit(1);
            }
        }
        i += 1;
    }
    if !tiers.is_empty() {
        config.tiers = tiers;
    }

    olist_core::initialize_logger(config.log_level, config.log_file.as_deref())
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize logger: {e:#}. Exiting.");
            process::exit(1);
        });

    println!("=== Olist tier database builder ===");
    println!("CSV directory: {}", config.csv_dir.display());
    println!("DB directory:  {}", config.db_dir.display());
    println!("Seed:          {}", config.build_seed);
    println!();

    let total_start = Instant::now();

    let t = Instant::now();
    let source = SourceData::load(&config.csv_dir).unwrap_or_else(|e| {
        log::error!("failed to load source CSVs: {e:#}");
        process::exit(1);
    });
    println!(
        "  Loaded {} customers, {} sellers, {} orders, {} items in {:.2?}",
        source.customers.len(),
        source.sellers.len(),
        source.orders.len(),
        source.items.len(),
        t.elapsed()
    );

    for (tier, data) in sample_tiers(&source, &config.tiers, config.build_seed) {
        let path = tier.db_path(&config.db_dir);
        let t = Instant::now();
        if let Err(e) = build_database(&path, &data) {
            log::error!("failed to build {tier} tier: {e:#}");
            process::exit(1);
        }
        println!(
            "  {:6} -> {} ({} customers, {} sellers, {} orders, {} items) in {:.2?}",
            tier.name(),
            path.display(),
            data.customers.len(),
            data.sellers.len(),
            data.orders.len(),
            data.items.len(),
            t.elapsed()
        );
    }

    println!();
    println!("Done in {:.2?}", total_start.elapsed());
}
