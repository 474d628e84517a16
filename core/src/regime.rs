//! Optimization regimes a query is timed under.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Regime {
    /// Keys disabled, automatic indexing off.
    Uninformed,
    /// Keyed schema, automatic indexing on.
    SelfOptimized,
    /// Keyed schema, automatic indexing off, hand-made indexes.
    UserOptimized,
}

impl Regime {
    /// Execution order within a tier. The derived view is created by the
    /// first regime and dropped by the last one.
    pub const ALL: [Regime; 3] = [
        Regime::Uninformed,
        Regime::SelfOptimized,
        Regime::UserOptimized,
    ];

    /// Series order on the chart.
    pub const CHART_ORDER: [Regime; 3] = [
        Regime::UserOptimized,
        Regime::SelfOptimized,
        Regime::Uninformed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Regime::Uninformed => "uninformed",
            Regime::SelfOptimized => "self-optimized",
            Regime::UserOptimized => "user-optimized",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Regime::Uninformed => "Uninformed",
            Regime::SelfOptimized => "Self-Optimized",
            Regime::UserOptimized => "User-Optimized",
        }
    }

    pub fn keys_enabled(self) -> bool {
        !matches!(self, Regime::Uninformed)
    }

    pub fn automatic_index(self) -> bool {
        matches!(self, Regime::SelfOptimized)
    }

    pub fn user_indexes(self) -> bool {
        matches!(self, Regime::UserOptimized)
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
