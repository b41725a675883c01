//! Upways Core — analysis engine for repeated probabilistic upgrades.
//!
//! An upgrade attempt at level `i` succeeds with a known probability; on
//! failure the level either stays or drops by one. This crate answers, for a
//! fixed per-step method assignment:
//! - expected attempts per level and in total (absorbing Markov chain)
//! - variance, normal-approximation intervals and a risk level
//! - the exact distribution of the attempt count
//! - the expected monetary cost
//!
//! Everything is synchronous, deterministic and free of I/O. Strategy search
//! lives in `upways-runner`.

pub mod analysis;
pub mod chain;
pub mod config;
pub mod cost;
pub mod distribution;
pub mod domain;
pub mod error;
pub mod matrix;
pub mod variance;

pub use analysis::{analyze, AnalysisReport};
pub use chain::{expected_visits, AbsorbingChain, ComputationMode, ExpectedVisits, Inversion};
pub use config::AnalysisConfig;
pub use cost::{expected_total_cost, CostSummary};
pub use distribution::{trial_distribution, Distribution, DistributionPoint, Percentiles};
pub use domain::{MaterialCost, Method, MethodId, Step, StepData, Strategy};
pub use error::CoreError;
pub use matrix::{Matrix, MatrixError};
pub use variance::{variance_model, Interval, IntervalEstimate, Intervals, RiskLevel, VarianceModel};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn domain_types_are_send_sync() {
        assert_send::<Method>();
        assert_sync::<Method>();
        assert_send::<StepData>();
        assert_sync::<StepData>();
        assert_send::<Strategy>();
        assert_sync::<Strategy>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<AnalysisReport>();
        assert_sync::<AnalysisReport>();
        assert_send::<ExpectedVisits>();
        assert_sync::<ExpectedVisits>();
        assert_send::<Distribution>();
        assert_sync::<Distribution>();
        assert_send::<VarianceModel>();
        assert_sync::<VarianceModel>();
        assert_send::<CoreError>();
        assert_sync::<CoreError>();
    }

    #[test]
    fn chain_types_are_send_sync() {
        assert_send::<AbsorbingChain>();
        assert_sync::<AbsorbingChain>();
        assert_send::<Matrix>();
        assert_sync::<Matrix>();
    }
}
