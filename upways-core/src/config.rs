//! Analysis parameters passed explicitly to every model.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default bounded-range limit: steps at or beyond it are modeled as
/// independent geometric trials.
pub const DEFAULT_BOUNDED_RANGE_LIMIT: usize = 9;

/// Default ceiling on distribution length.
pub const DEFAULT_MAX_TRIAL: usize = 10_000;

/// Default cumulative mass after which a distribution is truncated.
pub const DEFAULT_CUMULATIVE_THRESHOLD: f64 = 0.999;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub bounded_range_limit: usize,
    pub max_trial: usize,
    pub cumulative_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bounded_range_limit: DEFAULT_BOUNDED_RANGE_LIMIT,
            max_trial: DEFAULT_MAX_TRIAL,
            cumulative_threshold: DEFAULT_CUMULATIVE_THRESHOLD,
        }
    }
}

impl AnalysisConfig {
    pub fn with_bounded_range_limit(mut self, limit: usize) -> Self {
        self.bounded_range_limit = limit;
        self
    }

    pub fn with_max_trial(mut self, max_trial: usize) -> Self {
        self.max_trial = max_trial;
        self
    }

    pub fn with_cumulative_threshold(mut self, threshold: f64) -> Self {
        self.cumulative_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_trial == 0 {
            return Err(CoreError::InvalidConfig("max_trial must be positive".into()));
        }
        if !(self.cumulative_threshold > 0.0 && self.cumulative_threshold <= 1.0) {
            return Err(CoreError::InvalidConfig(format!(
                "cumulative_threshold must be in (0, 1], got {}",
                self.cumulative_threshold
            )));
        }
        Ok(())
    }

    /// Last step index (exclusive) handled by the Markov model for `end_level`.
    pub fn bounded_end(&self, end_level: usize) -> usize {
        end_level.min(self.bounded_range_limit)
    }
}
