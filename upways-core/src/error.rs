//! Error taxonomy for the analysis engine.

use thiserror::Error;

/// Errors surfaced by the analysis engine.
///
/// Singular matrices never appear here directly: the chain model recovers
/// from them with the iterative fallback and only reports
/// [`CoreError::FatalComputation`] when that fallback also fails.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid range: start {start} must be below end {end} (steps available: {available})")]
    InvalidRange {
        start: usize,
        end: usize,
        available: usize,
    },
    #[error("step {step} has a zero success rate; the target level is unreachable")]
    UnreachableTarget { step: usize },
    #[error("step {step} has success rate {rate}, expected a value in (0, 100]")]
    InvalidRate { step: usize, rate: f64 },
    #[error("step {step} lies past the bounded range but its method regresses on failure")]
    RegressingTailStep { step: usize },
    #[error("fatal computation error: {0}")]
    FatalComputation(String),
    #[error("invalid analysis config: {0}")]
    InvalidConfig(String),
}

/// Checks that `rate` is a usable percentage for `step`.
///
/// Zero is reported as [`CoreError::UnreachableTarget`] so that an infinite
/// expectation never reaches a cost sum.
pub(crate) fn validate_rate(step: usize, rate: f64) -> Result<(), CoreError> {
    if rate == 0.0 {
        return Err(CoreError::UnreachableTarget { step });
    }
    if !rate.is_finite() || rate < 0.0 || rate > 100.0 {
        return Err(CoreError::InvalidRate { step, rate });
    }
    Ok(())
}

/// Steps at or past the bounded-range limit are priced as independent
/// geometric trials, which only holds when failure keeps the level. Step 0
/// never regresses.
pub(crate) fn validate_tail_flag(step: usize, no_regression: bool) -> Result<(), CoreError> {
    if step > 0 && !no_regression {
        return Err(CoreError::RegressingTailStep { step });
    }
    Ok(())
}
