//! Dataset size tiers.
//!
//! Each tier is a separate SQLite file sampled from the same source CSVs at
//! its own inclusion rates.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Small,
    Medium,
    Large,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Small, Tier::Medium, Tier::Large];

    pub fn name(self) -> &'static str {
        match self {
            Tier::Small => "small",
            Tier::Medium => "medium",
            Tier::Large => "large",
        }
    }

    /// Label used on the chart's category axis.
    pub fn label(self) -> &'static str {
        match self {
            Tier::Small => "SmallDB",
            Tier::Medium => "MediumDB",
            Tier::Large => "LargeDB",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Tier::Small => "A3Small.db",
            Tier::Medium => "A3Medium.db",
            Tier::Large => "A3Large.db",
        }
    }

    /// Probability that a customer row is kept.
    pub fn customer_rate(self) -> f64 {
        match self {
            Tier::Small => 0.10,
            Tier::Medium => 0.20,
            Tier::Large => 0.33,
        }
    }

    /// Probability that a seller row is kept.
    pub fn seller_rate(self) -> f64 {
        match self {
            Tier::Small => 0.16,
            Tier::Medium => 0.24,
            Tier::Large => 0.32,
        }
    }

    pub fn db_path(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "s" => Ok(Tier::Small),
            "medium" | "med" | "m" => Ok(Tier::Medium),
            "large" | "l" => Ok(Tier::Large),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}
