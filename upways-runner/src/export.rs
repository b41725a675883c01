//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for strategy reports:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trial distribution and per-step breakdown for spreadsheets
//! - **Markdown**: human-readable single-plan reports and optimal-vs-custom comparisons
//!
//! Persisted reports carry a `schema_version` field. Newer versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use upways_core::DistributionPoint;

use crate::report::{Comparison, StepBreakdown, StrategyReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `StrategyReport` to pretty JSON.
pub fn export_json(report: &StrategyReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize StrategyReport to JSON")
}

/// Deserialize a `StrategyReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<StrategyReport> {
    let report: StrategyReport =
        serde_json::from_str(json).context("failed to deserialize StrategyReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: trials, probability, cumulative
pub fn export_distribution_csv(points: &[DistributionPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["trials", "probability", "cumulative"])?;
    for p in points {
        wtr.write_record([
            &p.trials.to_string(),
            &format!("{:.10}", p.probability),
            &format!("{:.10}", p.cumulative),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the per-step breakdown as CSV.
///
/// Columns: step, method, method_name, success_rate, no_regression,
/// expected_attempts, method_price, base_cost, material_cost,
/// cost_per_attempt, expected_cost
pub fn export_steps_csv(steps: &[StepBreakdown]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "step",
        "method",
        "method_name",
        "success_rate",
        "no_regression",
        "expected_attempts",
        "method_price",
        "base_cost",
        "material_cost",
        "cost_per_attempt",
        "expected_cost",
    ])?;

    for s in steps {
        wtr.write_record([
            &s.step.to_string(),
            s.method.as_str(),
            &s.method_name,
            &format!("{:.2}", s.success_rate),
            &s.no_regression.to_string(),
            &format!("{:.6}", s.expected_attempts),
            &format!("{:.6}", s.method_price),
            &format!("{:.6}", s.base_cost),
            &format!("{:.6}", s.material_cost),
            &format!("{:.6}", s.cost_per_attempt),
            &format!("{:.6}", s.expected_cost),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one report.
///
/// Creates a directory named `{label}_{timestamp}/` under `output_dir`
/// containing:
/// - `report.json` — the full `StrategyReport`
/// - `distribution.csv` — trial-count distribution
/// - `steps.csv` — per-step breakdown
/// - `report.md` — Markdown summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &StrategyReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        report.label,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(
        run_dir.join("distribution.csv"),
        export_distribution_csv(&report.analysis.distribution)?,
    )?;
    std::fs::write(run_dir.join("steps.csv"), export_steps_csv(&report.steps)?)?;
    std::fs::write(run_dir.join("report.md"), generate_report(report))?;

    Ok(run_dir)
}

/// Load a `StrategyReport` from an artifact directory's report.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<StrategyReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown report for a single plan.
pub fn generate_report(report: &StrategyReport) -> String {
    let a = &report.analysis;
    let mut md = String::with_capacity(2048);

    md.push_str(&format!("# Upgrade Plan: {}\n\n", report.label));

    md.push_str("## Summary\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Levels | {} to {} |\n",
        report.start_level, report.end_level
    ));
    md.push_str(&format!("| Mode | {:?} |\n", a.mode));
    md.push_str(&format!("| Expected Attempts | {:.2} |\n", a.total_trials));
    md.push_str(&format!("| Expected Cost | {:.2} |\n", a.total_cost));
    md.push_str(&format!(
        "| 95% Interval | {:.1} to {:.1} |\n",
        a.intervals.total.ci95.lower, a.intervals.total.ci95.upper
    ));
    md.push_str(&format!(
        "| 99% Interval | {:.1} to {:.1} |\n",
        a.intervals.total.ci99.lower, a.intervals.total.ci99.upper
    ));
    md.push_str(&format!("| Risk | {:?} |\n", a.risk_level));
    if let Some(candidates) = report.candidates_evaluated {
        md.push_str(&format!("| Candidates Evaluated | {candidates} |\n"));
    }
    md.push_str(&format!("| Fingerprint | {} |\n", report.fingerprint));
    md.push('\n');

    md.push_str("## Distribution\n\n");
    md.push_str("| Percentile | Attempts |\n");
    md.push_str("| --- | ---: |\n");
    let p = &a.percentiles;
    for (name, value) in [
        ("5%", p.p5),
        ("25%", p.p25),
        ("50%", p.p50),
        ("75%", p.p75),
        ("95%", p.p95),
    ] {
        md.push_str(&format!("| {name} | {} |\n", opt(value)));
    }
    if a.distribution_mass < 0.999 {
        md.push_str(&format!(
            "\nDistribution truncated with {:.2}% of the mass covered.\n",
            a.distribution_mass * 100.0
        ));
    }
    md.push('\n');

    md.push_str("## Steps\n\n");
    md.push_str("| Step | Method | Rate | Attempts | Cost/Attempt | Expected Cost |\n");
    md.push_str("| ---: | --- | ---: | ---: | ---: | ---: |\n");
    for s in &report.steps {
        let marker = if s.no_regression { " (safe)" } else { "" };
        md.push_str(&format!(
            "| {} | {}{} | {:.1}% | {:.2} | {:.2} | {:.2} |\n",
            s.step,
            s.method_name,
            marker,
            s.success_rate,
            s.expected_attempts,
            s.cost_per_attempt,
            s.expected_cost
        ));
    }
    md.push('\n');

    md
}

/// Generate a Markdown comparison of the optimal and a custom plan.
pub fn generate_comparison(optimal: &StrategyReport, custom: &StrategyReport, cmp: &Comparison) -> String {
    let mut md = String::with_capacity(1024);

    md.push_str("# Plan Comparison\n\n");
    md.push_str("| Metric | Optimal | Custom | Delta |\n");
    md.push_str("| --- | ---: | ---: | ---: |\n");
    md.push_str(&format!(
        "| Expected Cost | {:.2} | {:.2} | {:+.2} ({:+.1}%) |\n",
        cmp.optimal_cost,
        cmp.custom_cost,
        cmp.extra_cost,
        cmp.extra_cost_ratio * 100.0
    ));
    md.push_str(&format!(
        "| Expected Attempts | {:.2} | {:.2} | {:+.2} |\n",
        cmp.optimal_trials, cmp.custom_trials, cmp.trials_delta
    ));
    md.push_str(&format!(
        "| Median Attempts | {} | {} | |\n",
        opt(optimal.analysis.percentiles.p50),
        opt(custom.analysis.percentiles.p50)
    ));
    md.push('\n');

    if !cmp.differing_steps.is_empty() {
        md.push_str("## Differing Steps\n\n");
        md.push_str("| Step | Optimal | Custom |\n");
        md.push_str("| ---: | --- | --- |\n");
        for &step in &cmp.differing_steps {
            let name = |r: &StrategyReport| {
                r.steps
                    .iter()
                    .find(|s| s.step == step)
                    .map_or("-", |s| s.method_name.as_str())
                    .to_string()
            };
            md.push_str(&format!("| {step} | {} | {} |\n", name(optimal), name(custom)));
        }
        md.push('\n');
    }

    md
}

fn opt(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
