//! Optimizer configuration.

use serde::{Deserialize, Serialize};

use upways_core::MethodId;

use crate::catalog::{ids, MethodCatalog};
use crate::enumerator::OptimizeError;

/// Steps below this index take the forced method when one is configured.
pub const DEFAULT_FORCED_BELOW: usize = 4;

/// Knobs of the strategy search and of custom plan completion.
///
/// The defaults describe the reference catalog: War Scroll on the first four
/// steps, Magic Stone as the no-regression method, Dragon God Scroll for
/// unassigned custom steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub forced_below: usize,
    /// Single admissible method below `forced_below`. `None` lets every
    /// regressing method compete there too.
    pub forced_method: Option<MethodId>,
    /// Offered from `forced_below` on, and the only method past the bounded range.
    pub no_regression_method: MethodId,
    /// Fallback for custom plans that leave a step unassigned.
    pub default_method: Option<MethodId>,
    pub pruning: bool,
    pub parallel: bool,
    /// Refuse to search when the candidate count exceeds this.
    pub max_candidates: Option<usize>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            forced_below: DEFAULT_FORCED_BELOW,
            forced_method: Some(MethodId::from(ids::WAR_SCROLL)),
            no_regression_method: MethodId::from(ids::MAGIC_STONE),
            default_method: Some(MethodId::from(ids::DRAGON_GOD_SCROLL)),
            pruning: true,
            parallel: true,
            max_candidates: None,
        }
    }
}

impl OptimizerConfig {
    pub fn with_pruning(mut self, pruning: bool) -> Self {
        self.pruning = pruning;
        self
    }

    /// Enables or disables parallel candidate evaluation.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_candidates(mut self, budget: usize) -> Self {
        self.max_candidates = Some(budget);
        self
    }

    pub fn with_forced_method(mut self, method: Option<MethodId>, below: usize) -> Self {
        self.forced_method = method;
        self.forced_below = below;
        self
    }

    pub fn with_no_regression_method(mut self, method: MethodId) -> Self {
        self.no_regression_method = method;
        self
    }

    pub fn with_default_method(mut self, method: Option<MethodId>) -> Self {
        self.default_method = method;
        self
    }

    /// Checks the configuration against `catalog`. A no-regression method
    /// that regresses would be priced past the bounded range as if it did
    /// not. Ids missing from the catalog are reported where they are used.
    pub fn validate(&self, catalog: &MethodCatalog) -> Result<(), OptimizeError> {
        match catalog.get(&self.no_regression_method) {
            Ok(method) if !method.no_regression => Err(OptimizeError::RegressingNoRegressionMethod(
                self.no_regression_method.clone(),
            )),
            _ => Ok(()),
        }
    }
}
