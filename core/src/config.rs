//! Benchmark configuration resolved from `OLIST_*` environment variables.
//!
//! Every setting has a default, so with an empty environment the tools run
//! the full fixed benchmark matrix against `./A3*.db`.

use log::LevelFilter;
use std::env;
use std::path::PathBuf;

use crate::tier::Tier;

pub const DEFAULT_TRIALS: u32 = 50;
pub const DEFAULT_BUILD_SEED: u64 = 72;
pub const DEFAULT_CHART_CEILING_MS: f64 = 250.0;
pub const DEFAULT_LOG_FILE: &str = "olist-bench.log";
pub const DEFAULT_QUERIES: [&str; 2] = ["multi_item_orders", "above_average_orders"];

#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub db_dir: PathBuf,
    pub csv_dir: PathBuf,
    pub chart_dir: PathBuf,
    pub trials: u32,
    /// Seed for postal-code sampling. `None` uses the engine's `RANDOM()`.
    pub seed: Option<u64>,
    pub build_seed: u64,
    pub tiers: Vec<Tier>,
    pub queries: Vec<String>,
    pub chart_ceiling_ms: f64,
    pub log_level: LevelFilter,
    pub log_file: Option<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from("."),
            csv_dir: PathBuf::from("."),
            chart_dir: PathBuf::from("."),
            trials: DEFAULT_TRIALS,
            seed: None,
            build_seed: DEFAULT_BUILD_SEED,
            tiers: Tier::ALL.to_vec(),
            queries: DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect(),
            chart_ceiling_ms: DEFAULT_CHART_CEILING_MS,
            log_level: LevelFilter::Info,
            log_file: Some(DEFAULT_LOG_FILE.to_string()),
        }
    }
}

impl BenchConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup. Unparseable values fall back to
    /// the default for that key.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let path = |key: &str, default: PathBuf| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        Self {
            db_dir: path("OLIST_DB_DIR", defaults.db_dir),
            csv_dir: path("OLIST_CSV_DIR", defaults.csv_dir),
            chart_dir: path("OLIST_CHART_DIR", defaults.chart_dir),
            trials: lookup("OLIST_TRIALS")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.trials),
            seed: lookup("OLIST_SEED").and_then(|v| v.trim().parse::<u64>().ok()),
            build_seed: lookup("OLIST_BUILD_SEED")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(defaults.build_seed),
            tiers: lookup("OLIST_TIERS")
                .and_then(|v| parse_tiers(&v))
                .unwrap_or(defaults.tiers),
            queries: lookup("OLIST_QUERIES")
                .map(|v| parse_list(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.queries),
            chart_ceiling_ms: lookup("OLIST_CHART_CEILING_MS")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|&c| c > 0.0)
                .unwrap_or(defaults.chart_ceiling_ms),
            log_level: lookup("OLIST_LOG_LEVEL")
                .as_deref()
                .and_then(parse_log_level)
                .unwrap_or(defaults.log_level),
            log_file: match lookup("OLIST_LOG_FILE") {
                Some(value) => {
                    let trimmed = value.trim();
                    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                        None
                    } else {
                        Some(trimmed.to_string())
                    }
                }
                None => defaults.log_file,
            },
        }
    }
}

pub fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `None` if any entry is not a tier name, or the list is empty.
fn parse_tiers(value: &str) -> Option<Vec<Tier>> {
    let tiers = parse_list(value)
        .iter()
        .map(|s| s.parse::<Tier>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if tiers.is_empty() { None } else { Some(tiers) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> BenchConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BenchConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(config_from(&[]), BenchConfig::default());
        let cfg = BenchConfig::default();
        assert_eq!(cfg.trials, 50);
        assert_eq!(cfg.build_seed, 72);
        assert_eq!(cfg.tiers, Tier::ALL.to_vec());
        assert!(cfg.seed.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = config_from(&[
            ("OLIST_DB_DIR", "/data/dbs"),
            ("OLIST_TRIALS", "10"),
            ("OLIST_SEED", "7"),
            ("OLIST_TIERS", "small, large"),
            ("OLIST_QUERIES", "above_average_orders"),
            ("OLIST_LOG_LEVEL", "DEBUG"),
            ("OLIST_LOG_FILE", "none"),
        ]);
        assert_eq!(cfg.db_dir, PathBuf::from("/data/dbs"));
        assert_eq!(cfg.trials, 10);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.tiers, vec![Tier::Small, Tier::Large]);
        assert_eq!(cfg.queries, vec!["above_average_orders".to_string()]);
        assert_eq!(cfg.log_level, LevelFilter::Debug);
        assert_eq!(cfg.log_file, None);
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = config_from(&[
            ("OLIST_TRIALS", "0"),
            ("OLIST_TIERS", "small,gigantic"),
            ("OLIST_CHART_CEILING_MS", "-3"),
            ("OLIST_LOG_LEVEL", "loud"),
            ("OLIST_QUERIES", " , "),
        ]);
        let defaults = BenchConfig::default();
        assert_eq!(cfg.trials, defaults.trials);
        assert_eq!(cfg.tiers, defaults.tiers);
        assert_eq!(cfg.chart_ceiling_ms, defaults.chart_ceiling_ms);
        assert_eq!(cfg.log_level, defaults.log_level);
        assert_eq!(cfg.queries, defaults.queries);
    }
}
