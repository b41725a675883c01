//! Expected monetary cost of a strategy.

use serde::{Deserialize, Serialize};

use crate::chain::ExpectedVisits;
use crate::domain::Strategy;

/// `Σ waypoints[i] · cost_per_attempt[i]`.
///
/// Pairs are zipped, so a shorter cost array simply ignores the extra
/// waypoints.
pub fn expected_total_cost(waypoints: &[f64], costs: &[f64]) -> f64 {
    waypoints.iter().zip(costs).map(|(w, c)| w * c).sum()
}

/// Expected spend on each level.
pub fn cost_by_level(waypoints: &[f64], costs: &[f64]) -> Vec<f64> {
    waypoints.iter().zip(costs).map(|(w, c)| w * c).collect()
}

/// Total and per-level expected cost of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_cost: f64,
    pub by_level: Vec<f64>,
}

impl CostSummary {
    pub fn new(strategy: &Strategy, visits: &ExpectedVisits) -> Self {
        let by_level = cost_by_level(&visits.waypoints, &strategy.costs());
        Self {
            total_cost: by_level.iter().sum(),
            by_level,
        }
    }
}
