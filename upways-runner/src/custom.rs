//! User-chosen plans.
//!
//! A custom plan names a method for some steps; the rest are filled in from
//! the optimizer configuration. Steps past the bounded range always take the
//! no-regression method, whatever was requested.

use std::collections::BTreeMap;

use tracing::warn;

use upways_core::{AnalysisConfig, CoreError, Method, MethodId, StepData, Strategy};

use crate::catalog::MethodCatalog;
use crate::config::OptimizerConfig;
use crate::enumerator::OptimizeError;

/// Builds a validated strategy from a partial step → method assignment.
pub fn build_custom_strategy(
    catalog: &MethodCatalog,
    steps: &[StepData],
    start_level: usize,
    end_level: usize,
    assignments: &BTreeMap<usize, MethodId>,
    optimizer: &OptimizerConfig,
    analysis: &AnalysisConfig,
) -> Result<Strategy, OptimizeError> {
    if start_level >= end_level || steps.len() < end_level {
        return Err(CoreError::InvalidRange {
            start: start_level,
            end: end_level,
            available: steps.len(),
        }
        .into());
    }
    optimizer.validate(catalog)?;

    let methods = (0..end_level)
        .map(|step| {
            let id = method_for_step(step, assignments, optimizer, analysis)?;
            let method = catalog.get(id)?;
            if !method.is_available_at(step) {
                return Err(OptimizeError::MethodUnavailable {
                    method: id.clone(),
                    step,
                });
            }
            Ok(method)
        })
        .collect::<Result<Vec<&Method>, OptimizeError>>()?;

    Ok(Strategy::from_methods(start_level, end_level, &methods, steps)?)
}

fn method_for_step<'c>(
    step: usize,
    assignments: &'c BTreeMap<usize, MethodId>,
    optimizer: &'c OptimizerConfig,
    analysis: &AnalysisConfig,
) -> Result<&'c MethodId, OptimizeError> {
    if step >= analysis.bounded_range_limit {
        if let Some(requested) = assignments.get(&step) {
            if requested != &optimizer.no_regression_method {
                warn!(
                    step,
                    requested = %requested,
                    forced = %optimizer.no_regression_method,
                    "step past the bounded range; using the no-regression method"
                );
            }
        }
        return Ok(&optimizer.no_regression_method);
    }
    if let Some(id) = assignments.get(&step) {
        return Ok(id);
    }
    let fallback = if step < optimizer.forced_below {
        optimizer.forced_method.as_ref().or(optimizer.default_method.as_ref())
    } else {
        optimizer.default_method.as_ref()
    };
    fallback.ok_or(OptimizeError::NoCandidates { step })
}
