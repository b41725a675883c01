//! Strategy — one method per step, plus the derived rate/flag/cost arrays.

use serde::Serialize;

use super::method::{Method, MethodId};
use super::step::StepData;
use crate::error::CoreError;

/// A resolved step: the method chosen for it and what that choice implies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub method: MethodId,
    /// Percentage in (0, 100].
    pub success_rate: f64,
    pub no_regression: bool,
    pub cost_per_attempt: f64,
}

/// Immutable assignment of a method to every step below `end_level`.
///
/// Steps below `start_level` are part of the assignment because a failed
/// attempt can regress under the start level. A changed assignment means a
/// new `Strategy`; nothing here is mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strategy {
    start_level: usize,
    end_level: usize,
    steps: Vec<Step>,
}

impl Strategy {
    /// `steps` must cover exactly `0..end_level`.
    pub fn new(start_level: usize, end_level: usize, steps: Vec<Step>) -> Result<Self, CoreError> {
        if start_level >= end_level || steps.len() != end_level {
            return Err(CoreError::InvalidRange {
                start: start_level,
                end: end_level,
                available: steps.len(),
            });
        }
        Ok(Self {
            start_level,
            end_level,
            steps,
        })
    }

    /// Resolves `methods[i]` against `data[i]` for every step below `end_level`.
    pub fn from_methods(
        start_level: usize,
        end_level: usize,
        methods: &[&Method],
        data: &[StepData],
    ) -> Result<Self, CoreError> {
        if methods.len() < end_level || data.len() < end_level {
            return Err(CoreError::InvalidRange {
                start: start_level,
                end: end_level,
                available: methods.len().min(data.len()),
            });
        }
        let steps = methods
            .iter()
            .zip(data)
            .take(end_level)
            .enumerate()
            .map(|(i, (method, step_data))| Step {
                method: method.id.clone(),
                success_rate: method.rate_at(i, step_data),
                no_regression: method.no_regression,
                cost_per_attempt: method.cost_at(step_data),
            })
            .collect();
        Self::new(start_level, end_level, steps)
    }

    /// Builds a strategy straight from the derived arrays; method ids are
    /// synthesised as `step-{i}`.
    pub fn from_arrays(
        start_level: usize,
        end_level: usize,
        success_rates: &[f64],
        no_regression: &[bool],
        costs: &[f64],
    ) -> Result<Self, CoreError> {
        let available = success_rates.len().min(no_regression.len()).min(costs.len());
        if available < end_level {
            return Err(CoreError::InvalidRange {
                start: start_level,
                end: end_level,
                available,
            });
        }
        let steps = (0..end_level)
            .map(|i| Step {
                method: MethodId(format!("step-{i}")),
                success_rate: success_rates[i],
                no_regression: no_regression[i],
                cost_per_attempt: costs[i],
            })
            .collect();
        Self::new(start_level, end_level, steps)
    }

    pub fn start_level(&self) -> usize {
        self.start_level
    }

    pub fn end_level(&self) -> usize {
        self.end_level
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of successful attempts needed to cross the range.
    pub fn min_trials(&self) -> usize {
        self.end_level - self.start_level
    }

    pub fn success_rates(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.success_rate).collect()
    }

    pub fn no_regression_flags(&self) -> Vec<bool> {
        self.steps.iter().map(|s| s.no_regression).collect()
    }

    pub fn costs(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.cost_per_attempt).collect()
    }

    pub fn method_ids(&self) -> Vec<&MethodId> {
        self.steps.iter().map(|s| &s.method).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_or_inverted_range() {
        let err = Strategy::from_arrays(2, 2, &[50.0; 2], &[false; 2], &[1.0; 2]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange { start: 2, end: 2, .. }));
        let err = Strategy::from_arrays(3, 1, &[50.0; 3], &[false; 3], &[1.0; 3]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange { .. }));
    }

    #[test]
    fn rejects_range_beyond_supplied_steps() {
        let err = Strategy::from_arrays(0, 4, &[50.0; 3], &[false; 3], &[1.0; 3]).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidRange {
                start: 0,
                end: 4,
                available: 3
            }
        );
    }

    #[test]
    fn from_methods_resolves_rates_and_costs() {
        let manual = Method::new("manual", "Manual")
            .with_fixed_rates(vec![100.0, 60.0])
            .with_price(2.0);
        let stone = Method::new("stone", "Stone")
            .with_no_regression(true)
            .with_price(5.0);
        let data = vec![
            StepData::new(90.0).with_base_cost(1.0),
            StepData::new(80.0),
            StepData::new(25.0).with_material("ore", 1.0, 2.0),
        ];
        let s = Strategy::from_methods(0, 3, &[&manual, &manual, &stone], &data).unwrap();

        assert_eq!(s.success_rates(), vec![100.0, 60.0, 25.0]);
        assert_eq!(s.no_regression_flags(), vec![false, false, true]);
        assert_eq!(s.costs(), vec![3.0, 2.0, 7.0]);
        assert_eq!(s.min_trials(), 3);
        assert_eq!(s.method_ids()[2].as_str(), "stone");
    }
}
