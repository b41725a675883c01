//! Strategy reports — per-step breakdown plus the full analysis, ready to
//! persist or print.

use serde::{Deserialize, Serialize};

use upways_core::{analyze, AnalysisConfig, AnalysisReport, CoreError, MethodId, StepData, Strategy};

use crate::catalog::MethodCatalog;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// One step of a plan: what is used and what it is expected to cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepBreakdown {
    pub step: usize,
    pub method: MethodId,
    pub method_name: String,
    pub success_rate: f64,
    pub no_regression: bool,
    pub expected_attempts: f64,
    pub method_price: f64,
    pub base_cost: f64,
    pub material_cost: f64,
    pub cost_per_attempt: f64,
    pub expected_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub label: String,
    /// BLAKE3 of the evaluated assignment.
    pub fingerprint: String,
    pub start_level: usize,
    pub end_level: usize,
    pub steps: Vec<StepBreakdown>,
    pub analysis: AnalysisReport,
    /// Set when the report comes out of a search.
    #[serde(default)]
    pub candidates_evaluated: Option<usize>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl StrategyReport {
    pub fn build(
        label: impl Into<String>,
        strategy: &Strategy,
        catalog: &MethodCatalog,
        data: &[StepData],
        config: &AnalysisConfig,
    ) -> Result<Self, CoreError> {
        let analysis = analyze(strategy, config)?;
        let start = strategy.start_level();
        let end = strategy.end_level();
        if data.len() < end {
            return Err(CoreError::InvalidRange {
                start,
                end,
                available: data.len(),
            });
        }

        let steps = (start..end)
            .map(|i| {
                let step = &strategy.steps()[i];
                let method = catalog.methods().iter().find(|m| m.id == step.method);
                StepBreakdown {
                    step: i,
                    method: step.method.clone(),
                    method_name: method.map_or_else(|| step.method.to_string(), |m| m.name.clone()),
                    success_rate: step.success_rate,
                    no_regression: step.no_regression,
                    expected_attempts: analysis.waypoints[i],
                    method_price: method.map_or(0.0, |m| m.price),
                    base_cost: data[i].base_cost,
                    material_cost: data[i].material_cost(),
                    cost_per_attempt: step.cost_per_attempt,
                    expected_cost: analysis.cost_by_level[i],
                }
            })
            .collect();

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            label: label.into(),
            fingerprint: fingerprint(strategy),
            start_level: start,
            end_level: end,
            steps,
            analysis,
            candidates_evaluated: None,
        })
    }

    pub fn with_candidates_evaluated(mut self, candidates: usize) -> Self {
        self.candidates_evaluated = Some(candidates);
        self
    }

    pub fn total_cost(&self) -> f64 {
        self.analysis.total_cost
    }

    pub fn total_trials(&self) -> f64 {
        self.analysis.total_trials
    }
}

/// Deterministic hash of a strategy's range and resolved steps.
pub fn fingerprint(strategy: &Strategy) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(strategy.start_level() as u64).to_le_bytes());
    hasher.update(&(strategy.end_level() as u64).to_le_bytes());
    for step in strategy.steps() {
        hasher.update(step.method.as_str().as_bytes());
        hasher.update(&[0, u8::from(step.no_regression)]);
        hasher.update(&step.success_rate.to_bits().to_le_bytes());
        hasher.update(&step.cost_per_attempt.to_bits().to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Custom plan measured against the optimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub optimal_cost: f64,
    pub custom_cost: f64,
    /// Custom minus optimal; never negative for a true optimum.
    pub extra_cost: f64,
    /// `extra_cost / optimal_cost`, zero when the optimum is free.
    pub extra_cost_ratio: f64,
    pub optimal_trials: f64,
    pub custom_trials: f64,
    pub trials_delta: f64,
    /// Steps where the two plans pick different methods.
    pub differing_steps: Vec<usize>,
}

pub fn compare(optimal: &StrategyReport, custom: &StrategyReport) -> Comparison {
    let extra_cost = custom.total_cost() - optimal.total_cost();
    let extra_cost_ratio = if optimal.total_cost() > 0.0 {
        extra_cost / optimal.total_cost()
    } else {
        0.0
    };
    let differing_steps = optimal
        .steps
        .iter()
        .zip(&custom.steps)
        .filter(|(a, b)| a.step == b.step && a.method != b.method)
        .map(|(a, _)| a.step)
        .collect();

    Comparison {
        optimal_cost: optimal.total_cost(),
        custom_cost: custom.total_cost(),
        extra_cost,
        extra_cost_ratio,
        optimal_trials: optimal.total_trials(),
        custom_trials: custom.total_trials(),
        trials_delta: custom.total_trials() - optimal.total_trials(),
        differing_steps,
    }
}
