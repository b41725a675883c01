//! Upways CLI — plan and analyze upgrade strategies from scenario files.
//!
//! Commands:
//! - `optimize` — search for the cheapest plan and save its artifacts
//! - `analyze` — evaluate the scenario's custom plan
//! - `compare` — optimal plan vs the scenario's custom plan
//! - `catalog` — list the methods a scenario (or the reference catalog) offers

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use upways_runner::{
    analyze_custom, export_json, generate_comparison, optimize_scenario, plan_scenario,
    reference_catalog, save_artifacts, MethodCatalog, Scenario, StrategyReport,
};

#[derive(Parser)]
#[command(
    name = "upways",
    about = "Upways CLI — expected cost and risk of item upgrade plans"
)]
struct Cli {
    /// Emit machine-readable JSON instead of text (applies to logs too).
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every admissible plan and report the cheapest.
    Optimize {
        /// Path to a TOML scenario file.
        #[arg(long)]
        scenario: PathBuf,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print only; skip writing artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Evaluate the scenario's custom plan (unassigned steps use defaults).
    Analyze {
        /// Path to a TOML scenario file.
        #[arg(long)]
        scenario: PathBuf,
    },
    /// Compare the optimal plan against the scenario's custom plan.
    Compare {
        /// Path to a TOML scenario file.
        #[arg(long)]
        scenario: PathBuf,
    },
    /// List available methods and their prices.
    Catalog {
        /// Scenario whose catalog and prices to show. Defaults to the
        /// reference catalog at zero prices.
        #[arg(long)]
        scenario: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Commands::Optimize {
            scenario,
            output_dir,
            no_save,
        } => run_optimize(&scenario, &output_dir, no_save, cli.json),
        Commands::Analyze { scenario } => run_analyze(&scenario, cli.json),
        Commands::Compare { scenario } => run_compare(&scenario, cli.json),
        Commands::Catalog { scenario } => run_catalog(scenario.as_deref(), cli.json),
    }
}

/// Logs go to stderr so stdout stays parseable. Filter with `UPWAYS_LOG`.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("UPWAYS_LOG").unwrap_or_else(|_| EnvFilter::new("upways=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let scenario = Scenario::from_file(path)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;
    info!(
        path = %path.display(),
        start = scenario.start_level,
        end = scenario.end_level,
        "scenario loaded"
    );
    Ok(scenario)
}

fn run_optimize(path: &Path, output_dir: &Path, no_save: bool, json: bool) -> Result<()> {
    let scenario = load_scenario(path)?;
    let report = optimize_scenario(&scenario)?;

    if json {
        println!("{}", export_json(&report)?);
    } else {
        print_summary(&report);
    }

    if !no_save {
        let run_dir = save_artifacts(&report, output_dir)?;
        if json {
            info!(dir = %run_dir.display(), "artifacts saved");
        } else {
            println!("Artifacts saved to: {}", run_dir.display());
        }
    }
    Ok(())
}

fn run_analyze(path: &Path, json: bool) -> Result<()> {
    let scenario = load_scenario(path)?;
    let report = analyze_custom(&scenario)?;
    if json {
        println!("{}", export_json(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn run_compare(path: &Path, json: bool) -> Result<()> {
    let scenario = load_scenario(path)?;
    if scenario.custom_path.is_empty() {
        bail!("scenario {} has no [[custom_path]] entries to compare", path.display());
    }
    let plan = plan_scenario(&scenario)?;
    let (Some(custom), Some(comparison)) = (&plan.custom, &plan.comparison) else {
        bail!("custom plan was not evaluated");
    };

    if json {
        let value = serde_json::json!({
            "optimal": plan.optimal,
            "custom": custom,
            "comparison": comparison,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", generate_comparison(&plan.optimal, custom, comparison));
    }
    Ok(())
}

fn run_catalog(path: Option<&Path>, json: bool) -> Result<()> {
    let catalog: MethodCatalog = match path {
        Some(path) => load_scenario(path)?.catalog()?,
        None => reference_catalog(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(catalog.methods())?);
        return Ok(());
    }

    println!(
        "{:<20} {:<22} {:>8} {:>6} {:>9}  {}",
        "Id", "Name", "Price", "Safe", "Max Step", "Rates"
    );
    println!("{}", "-".repeat(90));
    for m in catalog.methods() {
        let rates = m.fixed_rates.as_ref().map_or_else(
            || "item rate".to_string(),
            |r| {
                r.iter()
                    .map(|v| format!("{v:.0}"))
                    .collect::<Vec<_>>()
                    .join(",")
            },
        );
        let max_step = m.max_step.map_or_else(|| "-".to_string(), |s| s.to_string());
        println!(
            "{:<20} {:<22} {:>8.2} {:>6} {:>9}  {}",
            m.id.as_str(),
            m.name,
            m.price,
            if m.no_regression { "yes" } else { "no" },
            max_step,
            rates
        );
    }
    Ok(())
}

fn print_summary(report: &StrategyReport) {
    let a = &report.analysis;
    println!();
    println!("=== {} plan ===", report.label);
    println!("Levels:         +{} to +{}", report.start_level, report.end_level);
    println!("Mode:           {:?}", a.mode);
    if let Some(n) = report.candidates_evaluated {
        println!("Candidates:     {n}");
    }
    println!();
    println!("--- Expectation ---");
    println!("Total Cost:     {:.2}", a.total_cost);
    println!("Total Trials:   {:.2}", a.total_trials);
    println!(
        "95% Interval:   {:.1} to {:.1} trials",
        a.intervals.total.ci95.lower, a.intervals.total.ci95.upper
    );
    println!("CV:             {:.3} ({:?} risk)", a.coefficient_of_variation, a.risk_level);
    let p = &a.percentiles;
    println!(
        "Percentiles:    p50 {}  p75 {}  p95 {}",
        fmt_percentile(p.p50),
        fmt_percentile(p.p75),
        fmt_percentile(p.p95)
    );
    println!();
    println!("--- Steps ---");
    println!(
        "{:<6} {:<22} {:>7} {:>10} {:>10} {:>12}",
        "Step", "Method", "Rate", "Attempts", "Per Try", "Expected"
    );
    println!("{}", "-".repeat(72));
    for s in &report.steps {
        println!(
            "{:<6} {:<22} {:>6.1}% {:>10.2} {:>10.2} {:>12.2}",
            format!("+{}", s.step),
            s.method_name,
            s.success_rate,
            s.expected_attempts,
            s.cost_per_attempt,
            s.expected_cost
        );
    }
    if a.distribution_mass < 0.999 {
        println!();
        println!(
            "WARNING: distribution truncated, {:.2}% of mass retained",
            a.distribution_mass * 100.0
        );
    }
    println!();
}

fn fmt_percentile(p: Option<usize>) -> String {
    p.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}
