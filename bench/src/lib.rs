//! SQLite query latency benchmark over the Olist e-commerce dataset.
//!
//! Measures one analytical query across three database sizes (tiers) and
//! three optimization regimes:
//! - **Uninformed**: primary/foreign keys removed, automatic indexing off
//! - **Self-optimized**: keyed schema, SQLite automatic indexing on
//! - **User-optimized**: keyed schema, automatic indexing off, hand-made indexes
//!
//! Build the tier databases: `cargo run --bin build-db`
//! Run the benchmark matrix: `cargo run --release --bin olist-bench`
//! Run tests: `cargo test`

pub mod index;
pub mod populate;
pub mod query;
pub mod report;
pub mod runner;
pub mod schema;
pub mod session;
pub mod source;
