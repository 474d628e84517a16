//! Benchmark runner: puts a tier database into the state a regime calls for,
//! times the query, and puts it back.
//!
//! Every regime opens its own session and closes it when done. Within a tier
//! the regimes run in [`Regime::ALL`] order; the query's view is created by
//! the uninformed run and dropped after the user-optimized run.

use anyhow::{Context, Result};
use log::{error, info};
use olist_core::{Regime, Tier};
use std::path::Path;

use crate::query::BenchQuery;
use crate::report::{BenchReport, RegimeResult};
use crate::session::{BenchSession, TrialRun};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub trials: u32,
    /// Seed for the postal-code sampler. `None` uses the engine's `RANDOM()`.
    pub seed: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            trials: olist_core::config::DEFAULT_TRIALS,
            seed: None,
        }
    }
}

impl RunOptions {
    pub fn open_session(&self, path: &Path) -> Result<BenchSession> {
        let session = BenchSession::open(path)?;
        Ok(match self.seed {
            Some(seed) => session.with_seed(seed),
            None => session,
        })
    }
}

/// Time `query` under `regime` on an open session.
///
/// The session is left with keys restored and user indexes dropped, also
/// when a trial fails. The view is left in place except after the
/// user-optimized regime, which closes the view's lifecycle.
pub fn run_regime_on(
    session: &mut BenchSession,
    tier: Tier,
    regime: Regime,
    query: &BenchQuery,
    trials: u32,
) -> Result<RegimeResult> {
    info!("{} / {tier} / {regime}: starting {trials} trials", query.name);

    if let Some(view) = &query.view {
        session.create_view(view)?;
    }
    session.set_automatic_index(regime.automatic_index())?;

    let run = match regime {
        Regime::Uninformed => {
            session.disable_keys()?;
            let timed = session.time_trials(query, trials);
            restore_after(session, timed, |s| s.restore_keys())?
        }
        Regime::SelfOptimized => session.time_trials(query, trials)?,
        Regime::UserOptimized => {
            session.create_indexes(&query.indexes)?;
            let timed = session.time_trials(query, trials);
            let run = restore_after(session, timed, |s| s.drop_indexes(&query.indexes))?;
            if let Some(view) = &query.view {
                session.drop_view(view)?;
            }
            run
        }
    };

    let result = RegimeResult::new(tier, regime, run);
    info!(
        "{} / {tier} / {regime}: mean {:.6}s ({:.0}ms)",
        query.name,
        result.mean_secs(),
        result.mean_ms_rounded()
    );
    Ok(result)
}

/// Run the cleanup step whatever the timed loop returned, then hand back the
/// loop's outcome. A cleanup failure after a failed loop is logged and the
/// loop's error wins.
fn restore_after<F>(session: &BenchSession, timed: Result<TrialRun>, cleanup: F) -> Result<TrialRun>
where
    F: FnOnce(&BenchSession) -> Result<()>,
{
    match timed {
        Ok(run) => {
            cleanup(session)?;
            Ok(run)
        }
        Err(err) => {
            if let Err(cleanup_err) = cleanup(session) {
                error!("cleanup after failed trials also failed: {cleanup_err:#}");
            }
            Err(err)
        }
    }
}

/// Open the tier file, time one regime, close the file.
pub fn run_regime(
    path: &Path,
    tier: Tier,
    regime: Regime,
    query: &BenchQuery,
    options: &RunOptions,
) -> Result<RegimeResult> {
    let mut session = options.open_session(path)?;
    let result = run_regime_on(&mut session, tier, regime, query, options.trials)
        .with_context(|| format!("{} failed on {tier} tier under {regime}", query.name))?;
    session.close()?;
    Ok(result)
}

/// All three regimes for one tier, in execution order.
pub fn run_tier(
    db_dir: &Path,
    tier: Tier,
    query: &BenchQuery,
    options: &RunOptions,
) -> Result<Vec<RegimeResult>> {
    let path = tier.db_path(db_dir);
    Regime::ALL
        .into_iter()
        .map(|regime| run_regime(&path, tier, regime, query, options))
        .collect()
}

/// The full tier × regime matrix for one query. The first failure aborts.
pub fn run_matrix(
    db_dir: &Path,
    tiers: &[Tier],
    query: &BenchQuery,
    options: &RunOptions,
) -> Result<BenchReport> {
    let mut report = BenchReport::new(query.name, query.description);
    for &tier in tiers {
        report.results.extend(run_tier(db_dir, tier, query, options)?);
    }
    Ok(report)
}
