//! Scenario runner — wires catalog, enumerator, custom builder and reports.
//!
//! Two entry points:
//! - `optimize_scenario()`: searches for the cheapest plan.
//! - `plan_scenario()`: the optimum, plus the scenario's custom plan and a
//!   comparison when one is given.

use thiserror::Error;
use tracing::info;

use upways_core::CoreError;

use crate::custom::build_custom_strategy;
use crate::enumerator::{OptimizeError, StrategyEnumerator};
use crate::report::{compare, Comparison, StrategyReport};
use crate::scenario::{Scenario, ScenarioError};

/// Errors from the scenario runner.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("optimizer error: {0}")]
    Optimize(#[from] OptimizeError),
    #[error("analysis error: {0}")]
    Core(#[from] CoreError),
}

/// Result of planning one scenario.
#[derive(Debug, Clone)]
pub struct Plan {
    pub optimal: StrategyReport,
    pub custom: Option<StrategyReport>,
    pub comparison: Option<Comparison>,
}

/// Finds and reports the cheapest plan for `scenario`.
pub fn optimize_scenario(scenario: &Scenario) -> Result<StrategyReport, PlanError> {
    let catalog = scenario.catalog()?;
    let data = scenario.step_data();
    let enumerator = StrategyEnumerator::new(&catalog, &data, scenario.optimizer.clone(), scenario.analysis);
    let best = enumerator.optimize(scenario.start_level, scenario.end_level)?;
    let report = StrategyReport::build("optimal", &best.strategy, &catalog, &data, &scenario.analysis)?
        .with_candidates_evaluated(best.candidates_evaluated);
    Ok(report)
}

/// Reports the scenario's custom plan; unassigned steps take the defaults.
pub fn analyze_custom(scenario: &Scenario) -> Result<StrategyReport, PlanError> {
    let catalog = scenario.catalog()?;
    let data = scenario.step_data();
    let strategy = build_custom_strategy(
        &catalog,
        &data,
        scenario.start_level,
        scenario.end_level,
        &scenario.custom_assignments(),
        &scenario.optimizer,
        &scenario.analysis,
    )?;
    Ok(StrategyReport::build("custom", &strategy, &catalog, &data, &scenario.analysis)?)
}

pub fn plan_scenario(scenario: &Scenario) -> Result<Plan, PlanError> {
    let optimal = optimize_scenario(scenario)?;
    let (custom, comparison) = if scenario.custom_path.is_empty() {
        (None, None)
    } else {
        let custom = analyze_custom(scenario)?;
        let comparison = compare(&optimal, &custom);
        info!(
            extra_cost = comparison.extra_cost,
            differing_steps = comparison.differing_steps.len(),
            "custom plan compared"
        );
        (Some(custom), Some(comparison))
    };
    Ok(Plan {
        optimal,
        custom,
        comparison,
    })
}
