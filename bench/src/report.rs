//! Report module: prints benchmark results and renders the grouped bar chart.

use anyhow::{Context, Result};
use olist_core::{Regime, Tier};
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::session::{Trial, TrialRun};

/// Results from timing one query under one (tier, regime) configuration.
#[derive(Debug, Clone)]
pub struct RegimeResult {
    pub tier: Tier,
    pub regime: Regime,
    pub elapsed: Duration,
    pub trials: Vec<Trial>,
}

impl RegimeResult {
    pub fn new(tier: Tier, regime: Regime, run: TrialRun) -> Self {
        Self {
            tier,
            regime,
            elapsed: run.elapsed,
            trials: run.trials,
        }
    }

    pub fn trial_count(&self) -> usize {
        self.trials.len()
    }

    /// Mean wall-clock time per query, in seconds.
    pub fn mean_secs(&self) -> f64 {
        if self.trials.is_empty() {
            return 0.0;
        }
        self.elapsed.as_secs_f64() / self.trials.len() as f64
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean_secs() * 1000.0
    }

    /// Mean per query rounded to whole milliseconds.
    pub fn mean_ms_rounded(&self) -> f64 {
        self.mean_ms().round()
    }

    pub fn postal_codes(&self) -> impl Iterator<Item = i64> + '_ {
        self.trials.iter().map(|t| t.postal_code)
    }
}

/// All results for one query across the tier × regime matrix.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub query: String,
    pub description: String,
    pub results: Vec<RegimeResult>,
}

impl BenchReport {
    pub fn new(query: &str, description: &str) -> Self {
        Self {
            query: query.to_string(),
            description: description.to_string(),
            results: Vec::new(),
        }
    }

    pub fn get(&self, tier: Tier, regime: Regime) -> Option<&RegimeResult> {
        self.results
            .iter()
            .find(|r| r.tier == tier && r.regime == regime)
    }

    /// Tiers that have at least one result, in tier order.
    pub fn tiers(&self) -> Vec<Tier> {
        Tier::ALL
            .into_iter()
            .filter(|&t| self.results.iter().any(|r| r.tier == t))
            .collect()
    }
}

/// Print a formatted results table.
pub fn print_report(report: &BenchReport) {
    println!("\n{}", "=".repeat(72));
    println!("  Query: {} ({})", report.query, report.description);
    println!("{}", "=".repeat(72));
    println!(
        "  {:8} {:16} {:>8} {:>14} {:>12} {:>8}",
        "Tier", "Regime", "Trials", "Mean (s)", "Mean (ms)", "Rows"
    );
    println!("  {}", "-".repeat(70));

    for tier in report.tiers() {
        for regime in Regime::ALL {
            let Some(r) = report.get(tier, regime) else {
                continue;
            };
            let rows: i64 = r.trials.iter().map(|t| t.count).sum();
            println!(
                "  {:8} {:16} {:>8} {:>14.6} {:>12.0} {:>8}",
                tier.name(),
                regime.label(),
                r.trial_count(),
                r.mean_secs(),
                r.mean_ms_rounded(),
                rows
            );
        }
    }
    println!();
}

const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 50.0;
const BAR_WIDTH_FRACTION: f64 = 0.25;
const Y_TICKS: u32 = 5;
const SERIES_COLORS: [&str; 3] = ["#1f77b4", "#ff7f0e", "#2ca02c"];

/// Render a grouped bar chart (tiers × regimes) of rounded mean milliseconds.
///
/// Bars taller than `ceiling_ms` are clipped at the top of the plot; the
/// label above each bar always shows the measured value.
pub fn render_chart_svg(report: &BenchReport, ceiling_ms: f64) -> Result<String> {
    let mut svg = String::new();
    draw_chart(&mut svg, report, ceiling_ms).context("failed to render chart")?;
    Ok(svg)
}

fn draw_chart(svg: &mut String, report: &BenchReport, ceiling_ms: f64) -> fmt::Result {
    let plot_w = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let base_y = MARGIN_TOP + plot_h;
    let tiers = report.tiers();
    let group_w = plot_w / tiers.len().max(1) as f64;
    let bar_w = group_w * BAR_WIDTH_FRACTION;

    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{CHART_WIDTH}" height="{CHART_HEIGHT}" font-family="sans-serif" font-size="12">"#
    )?;
    writeln!(svg, r#"<rect width="{CHART_WIDTH}" height="{CHART_HEIGHT}" fill="white"/>"#)?;
    writeln!(
        svg,
        r#"<text x="{}" y="20" text-anchor="middle" font-size="16">Query Runtime: {}</text>"#,
        CHART_WIDTH / 2.0,
        escape(&report.query)
    )?;

    // Y axis with ticks.
    writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{base_y}" stroke="black"/>"#
    )?;
    for i in 0..=Y_TICKS {
        let value = ceiling_ms * i as f64 / Y_TICKS as f64;
        let y = base_y - plot_h * i as f64 / Y_TICKS as f64;
        writeln!(
            svg,
            r#"<line x1="{}" y1="{y:.1}" x2="{MARGIN_LEFT}" y2="{y:.1}" stroke="black"/><text x="{}" y="{:.1}" text-anchor="end">{value:.0}</text>"#,
            MARGIN_LEFT - 5.0,
            MARGIN_LEFT - 8.0,
            y + 4.0
        )?;
    }
    writeln!(
        svg,
        r#"<text x="18" y="{:.1}" text-anchor="middle" transform="rotate(-90 18 {:.1})">Avg Time (ms)</text>"#,
        MARGIN_TOP + plot_h / 2.0,
        MARGIN_TOP + plot_h / 2.0
    )?;
    writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{base_y}" x2="{}" y2="{base_y}" stroke="black"/>"#,
        MARGIN_LEFT + plot_w
    )?;

    for (gi, tier) in tiers.iter().enumerate() {
        let group_x = MARGIN_LEFT + group_w * gi as f64;
        let bars_x = group_x + (group_w - bar_w * Regime::CHART_ORDER.len() as f64) / 2.0;
        for (si, regime) in Regime::CHART_ORDER.iter().enumerate() {
            let Some(result) = report.get(*tier, *regime) else {
                continue;
            };
            let value = result.mean_ms_rounded();
            let h = if ceiling_ms > 0.0 {
                (value.min(ceiling_ms) / ceiling_ms) * plot_h
            } else {
                0.0
            };
            let x = bars_x + bar_w * si as f64;
            writeln!(
                svg,
                r#"<rect x="{x:.1}" y="{:.1}" width="{bar_w:.1}" height="{h:.1}" fill="{}"/><text x="{:.1}" y="{:.1}" text-anchor="middle">{value:.0}</text>"#,
                base_y - h,
                SERIES_COLORS[si % SERIES_COLORS.len()],
                x + bar_w / 2.0,
                base_y - h - 3.0
            )?;
        }
        writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            group_x + group_w / 2.0,
            base_y + 20.0,
            tier.label()
        )?;
    }

    // Legend, one row across the top of the plot.
    for (si, regime) in Regime::CHART_ORDER.iter().enumerate() {
        let x = MARGIN_LEFT + 10.0 + 150.0 * si as f64;
        writeln!(
            svg,
            r#"<rect x="{x:.1}" y="32" width="12" height="12" fill="{}"/><text x="{:.1}" y="42">{}</text>"#,
            SERIES_COLORS[si % SERIES_COLORS.len()],
            x + 16.0,
            regime.label()
        )?;
    }

    writeln!(svg, "</svg>")
}

pub fn write_chart(report: &BenchReport, path: &Path, ceiling_ms: f64) -> Result<()> {
    fs::write(path, render_chart_svg(report, ceiling_ms)?)
        .with_context(|| format!("failed to write chart {}", path.display()))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
