//! One-call analysis of a strategy: expectations, cost, intervals, risk and
//! the exact trial distribution.

use serde::{Deserialize, Serialize};

use crate::chain::{ComputationMode, Inversion};
use crate::config::AnalysisConfig;
use crate::cost::CostSummary;
use crate::distribution::{trial_distribution, DistributionPoint, Percentiles};
use crate::domain::Strategy;
use crate::error::CoreError;
use crate::variance::{variance_model, Intervals, RiskLevel};

/// Everything the presentation layer needs about one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub start_level: usize,
    pub end_level: usize,
    pub mode: ComputationMode,
    pub inversion: Option<Inversion>,
    pub waypoints: Vec<f64>,
    pub total_trials: f64,
    pub total_cost: f64,
    pub cost_by_level: Vec<f64>,
    pub total_variance: f64,
    pub intervals: Intervals,
    pub coefficient_of_variation: f64,
    pub risk_level: RiskLevel,
    /// Read off the exact distribution; preferred over `intervals`.
    pub percentiles: Percentiles,
    /// Probability mass retained after truncation.
    pub distribution_mass: f64,
    pub distribution: Vec<DistributionPoint>,
}

impl AnalysisReport {
    /// Cumulative probability of finishing within `trials` attempts, read
    /// from the stored points.
    pub fn probability_within(&self, trials: usize) -> f64 {
        self.distribution
            .iter()
            .take_while(|p| p.trials <= trials)
            .last()
            .map_or(0.0, |p| p.cumulative)
    }
}

/// Runs every model over `strategy`.
pub fn analyze(strategy: &Strategy, config: &AnalysisConfig) -> Result<AnalysisReport, CoreError> {
    config.validate()?;
    let model = variance_model(strategy, config)?;
    let cost = CostSummary::new(strategy, &model.visits);
    let distribution = trial_distribution(strategy, config)?;

    Ok(AnalysisReport {
        start_level: strategy.start_level(),
        end_level: strategy.end_level(),
        mode: model.visits.mode,
        inversion: model.visits.inversion,
        waypoints: model.visits.waypoints,
        total_trials: model.visits.total_trials,
        total_cost: cost.total_cost,
        cost_by_level: cost.by_level,
        total_variance: model.total_variance,
        intervals: model.intervals,
        coefficient_of_variation: model.coefficient_of_variation,
        risk_level: model.risk_level,
        percentiles: distribution.percentiles(),
        distribution_mass: distribution.total_mass(),
        distribution: distribution.points(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_is_consistent() {
        let s = Strategy::from_arrays(0, 2, &[50.0, 50.0], &[false, false], &[10.0, 3.0]).unwrap();
        let r = analyze(&s, &AnalysisConfig::default()).unwrap();
        assert!((r.total_trials - 6.0).abs() < 1e-9);
        assert!((r.total_cost - 46.0).abs() < 1e-9);
        assert_eq!(r.mode, ComputationMode::Markov);
        assert_eq!(r.intervals.by_level.len(), 2);
        assert!(r.distribution_mass > 0.999);
        assert_eq!(r.distribution[0].trials, 2);
    }

    #[test]
    fn probability_within_reads_cumulative() {
        let s = Strategy::from_arrays(0, 1, &[50.0], &[false], &[1.0]).unwrap();
        let r = analyze(&s, &AnalysisConfig::default()).unwrap();
        assert_eq!(r.probability_within(0), 0.0);
        assert!((r.probability_within(1) - 0.5).abs() < 1e-12);
        assert!((r.probability_within(2) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let s = Strategy::from_arrays(0, 1, &[50.0], &[false], &[1.0]).unwrap();
        let cfg = AnalysisConfig::default().with_max_trial(0);
        assert!(matches!(analyze(&s, &cfg), Err(CoreError::InvalidConfig(_))));
    }
}
