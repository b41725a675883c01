//! Variance of visit counts, normal-approximation intervals and risk level.
//!
//! For the Markov range the variance of visits is
//! `N(2·diag(N) − I) − N∘N`; geometric tail steps contribute `(1-p)/p²`.
//! The intervals are a fast display surrogate: the true trial count is
//! discrete and skewed for low rates, so [`crate::distribution`] is the
//! authoritative source wherever precision matters.

use serde::{Deserialize, Serialize};

use crate::chain::{direct_visits, AbsorbingChain, ComputationMode, ExpectedVisits};
use crate::config::AnalysisConfig;
use crate::domain::Strategy;
use crate::error::CoreError;
use crate::matrix::Matrix;

pub const Z_95: f64 = 1.96;
pub const Z_99: f64 = 2.58;

/// Coefficient of variation below which a plan is `Low` risk.
pub const LOW_RISK_CV: f64 = 0.20;
/// Coefficient of variation below which a plan is `Medium` risk.
pub const MEDIUM_RISK_CV: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_cv(cv: f64) -> Self {
        if cv < LOW_RISK_CV {
            Self::Low
        } else if cv < MEDIUM_RISK_CV {
            Self::Medium
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    fn around(mean: f64, std: f64, z: f64, floor: f64) -> Self {
        Self {
            lower: (mean - z * std).max(floor),
            upper: mean + z * std,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalEstimate {
    pub mean: f64,
    pub std: f64,
    pub ci95: Interval,
    pub ci99: Interval,
}

impl IntervalEstimate {
    /// Lower bounds are clamped to `floor`.
    pub fn new(mean: f64, std: f64, floor: f64) -> Self {
        Self {
            mean,
            std,
            ci95: Interval::around(mean, std, Z_95, floor),
            ci99: Interval::around(mean, std, Z_99, floor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervals {
    /// Total attempts; lower bounds never fall under one attempt.
    pub total: IntervalEstimate,
    /// Per level; lower bounds never fall under zero.
    pub by_level: Vec<IntervalEstimate>,
}

/// Expected visits extended with their spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceModel {
    pub visits: ExpectedVisits,
    pub total_variance: f64,
    /// Clamped to be non-negative.
    pub level_variances: Vec<f64>,
    pub intervals: Intervals,
    pub coefficient_of_variation: f64,
    pub risk_level: RiskLevel,
}

/// `N(2·diag(N) − I) − N∘N`.
pub fn variance_matrix(n: &Matrix) -> Matrix {
    let two_dg_minus_i = &n.diagonal().scale(2.0) - &Matrix::identity(n.rows());
    &(n * &two_dg_minus_i) - &n.hadamard_square()
}

/// Variance of a geometric trial count with success percentage `rate`.
pub fn geometric_variance(rate: f64) -> f64 {
    let p = rate / 100.0;
    (1.0 - p) / (p * p)
}

pub fn variance_model(strategy: &Strategy, config: &AnalysisConfig) -> Result<VarianceModel, CoreError> {
    let start = strategy.start_level();
    let end = strategy.end_level();
    let limit = config.bounded_range_limit;
    let rates = strategy.success_rates();

    let mut waypoints = vec![0.0; end];
    let mut raw_variances = vec![0.0; end];
    let mut inversion = None;

    let bounded_end = config.bounded_end(end);
    if start < bounded_end {
        let chain = AbsorbingChain::new(
            &rates[..bounded_end],
            &strategy.no_regression_flags()[..bounded_end],
            start,
        )?;
        let fundamental = chain.fundamental()?;
        let var = variance_matrix(&fundamental.matrix);
        waypoints[..bounded_end].copy_from_slice(fundamental.matrix.row(start));
        raw_variances[..bounded_end].copy_from_slice(var.row(start));
        inversion = Some(fundamental.inversion);
    }

    let flags = strategy.no_regression_flags();
    for (step, expected) in direct_visits(&rates, &flags, start.max(limit), end)? {
        waypoints[step] = expected;
        raw_variances[step] = geometric_variance(rates[step]);
    }

    let total_trials: f64 = waypoints.iter().sum();
    let total_variance = raw_variances.iter().sum::<f64>().max(0.0);
    let total_std = total_variance.sqrt();
    let level_variances: Vec<f64> = raw_variances.iter().map(|v| v.max(0.0)).collect();

    let by_level = waypoints
        .iter()
        .zip(&level_variances)
        .map(|(&mean, &var)| IntervalEstimate::new(mean, var.sqrt(), 0.0))
        .collect();

    let coefficient_of_variation = if total_trials > 0.0 {
        total_std / total_trials
    } else {
        0.0
    };

    Ok(VarianceModel {
        visits: ExpectedVisits {
            waypoints,
            total_trials,
            mode: ComputationMode::for_range(start, end, limit),
            inversion,
        },
        total_variance,
        level_variances,
        intervals: Intervals {
            total: IntervalEstimate::new(total_trials, total_std, 1.0),
            by_level,
        },
        coefficient_of_variation,
        risk_level: RiskLevel::from_cv(coefficient_of_variation),
    })
}
