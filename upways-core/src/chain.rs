//! Absorbing Markov chain over the bounded range, and expected visit counts.
//!
//! Transient state `i` means "currently at level i". An attempt at `i`
//! succeeds with `rate_i` and moves to `i + 1`; a failure stays at `i` (step
//! 0, or a no-regression method) or drops to `i - 1`. State `n` absorbs.
//!
//! The fundamental matrix `N = (I - Q)⁻¹` gives expected visits: `N[s][j]` is
//! the expected number of attempts made at level `j` starting from `s`.
//! Steps at or beyond the bounded-range limit only admit no-regression
//! methods, so each of them contributes an independent geometric expectation
//! of `100 / rate` and no matrix is built for them.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AnalysisConfig;
use crate::domain::Strategy;
use crate::error::{validate_rate, validate_tail_flag, CoreError};
use crate::matrix::{Matrix, MatrixError};

/// How the fundamental matrix was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inversion {
    /// Gauss-Jordan elimination.
    Direct,
    /// Truncated Neumann series after the direct inversion hit a singular pivot.
    Iterative { terms: usize },
}

/// Which parts of the range were modeled as a Markov chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationMode {
    /// The whole range lies below the bounded-range limit.
    Markov,
    /// The whole range lies at or beyond the limit.
    Direct,
    /// Markov chain below the limit, geometric tail beyond it.
    Mixed,
}

impl ComputationMode {
    pub fn for_range(start_level: usize, end_level: usize, limit: usize) -> Self {
        if end_level <= limit {
            Self::Markov
        } else if start_level >= limit {
            Self::Direct
        } else {
            Self::Mixed
        }
    }
}

/// `N = (I - Q)⁻¹` tagged with the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FundamentalMatrix {
    pub matrix: Matrix,
    pub inversion: Inversion,
}

impl FundamentalMatrix {
    /// Inverts `I - q`, falling back to the Neumann series on a singular
    /// pivot. Fails with [`CoreError::FatalComputation`] when the series
    /// does not converge either.
    pub fn of_transient(q: &Matrix) -> Result<Self, CoreError> {
        let i_minus_q = &Matrix::identity(q.rows()) - q;
        match i_minus_q.inverse() {
            Ok(matrix) => Ok(Self {
                matrix,
                inversion: Inversion::Direct,
            }),
            Err(MatrixError::Singular { column, pivot }) => {
                warn!(column, pivot, "direct inversion failed, using neumann series");
                let (matrix, terms) = q
                    .neumann_series()
                    .map_err(|e| CoreError::FatalComputation(e.to_string()))?;
                Ok(Self {
                    matrix,
                    inversion: Inversion::Iterative { terms },
                })
            }
            Err(e) => Err(CoreError::FatalComputation(e.to_string())),
        }
    }
}

/// Absorbing chain over transient states `0..n`.
#[derive(Debug, Clone)]
pub struct AbsorbingChain {
    q: Matrix,
    start: usize,
    last_success: f64,
}

impl AbsorbingChain {
    /// Builds the chain for `success_rates[0..n)` (percentages) starting at
    /// `start`. Every rate is validated before any matrix is built.
    pub fn new(success_rates: &[f64], no_regression: &[bool], start: usize) -> Result<Self, CoreError> {
        let n = success_rates.len();
        if start >= n || no_regression.len() < n {
            return Err(CoreError::InvalidRange {
                start,
                end: n,
                available: no_regression.len().min(n),
            });
        }
        for (step, &rate) in success_rates.iter().enumerate() {
            validate_rate(step, rate)?;
        }

        let p = Self::transition_matrix(success_rates, no_regression);
        Ok(Self {
            q: p.block(n, n),
            start,
            last_success: success_rates[n - 1] / 100.0,
        })
    }

    /// Full `(n+1) × (n+1)` transition matrix, absorbing state last.
    pub fn transition_matrix(success_rates: &[f64], no_regression: &[bool]) -> Matrix {
        let n = success_rates.len();
        let mut p = Matrix::zeros(n + 1, n + 1);
        for (i, &rate) in success_rates.iter().enumerate() {
            let success = rate / 100.0;
            let failure = 1.0 - success;
            p[(i, i + 1)] = success;
            if i == 0 || no_regression[i] {
                p[(i, i)] += failure;
            } else {
                p[(i, i - 1)] += failure;
            }
        }
        p[(n, n)] = 1.0;
        p
    }

    /// Transient block `Q`.
    pub fn q(&self) -> &Matrix {
        &self.q
    }

    pub fn size(&self) -> usize {
        self.q.rows()
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Success probability of the final transient step (the only way into
    /// the absorbing state).
    pub fn last_success(&self) -> f64 {
        self.last_success
    }

    /// `(I - Q)⁻¹`, falling back to the Neumann series on a singular pivot.
    pub fn fundamental(&self) -> Result<FundamentalMatrix, CoreError> {
        FundamentalMatrix::of_transient(&self.q)
    }
}

/// Expected attempts per step and in total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedVisits {
    /// One entry per level below `end_level`. Levels under the start can be
    /// non-zero when failures regress.
    pub waypoints: Vec<f64>,
    pub total_trials: f64,
    pub mode: ComputationMode,
    /// `None` when no Markov chain was needed.
    pub inversion: Option<Inversion>,
}

/// Expected visit counts for `strategy`.
pub fn expected_visits(strategy: &Strategy, config: &AnalysisConfig) -> Result<ExpectedVisits, CoreError> {
    let start = strategy.start_level();
    let end = strategy.end_level();
    let limit = config.bounded_range_limit;
    let rates = strategy.success_rates();
    let mut waypoints = vec![0.0; end];
    let mut inversion = None;

    let bounded_end = config.bounded_end(end);
    if start < bounded_end {
        let chain = AbsorbingChain::new(
            &rates[..bounded_end],
            &strategy.no_regression_flags()[..bounded_end],
            start,
        )?;
        let fundamental = chain.fundamental()?;
        waypoints[..bounded_end].copy_from_slice(fundamental.matrix.row(start));
        inversion = Some(fundamental.inversion);
    }

    let flags = strategy.no_regression_flags();
    for (step, expected) in direct_visits(&rates, &flags, start.max(limit), end)? {
        waypoints[step] = expected;
    }

    let total_trials = waypoints.iter().sum();
    Ok(ExpectedVisits {
        waypoints,
        total_trials,
        mode: ComputationMode::for_range(start, end, limit),
        inversion,
    })
}

/// `100 / rate` for every step in `from..to`, the expectation of an
/// independent geometric trial. Fails on a step whose method regresses.
pub fn direct_visits(
    success_rates: &[f64],
    no_regression: &[bool],
    from: usize,
    to: usize,
) -> Result<Vec<(usize, f64)>, CoreError> {
    (from..to)
        .map(|step| {
            let rate = success_rates[step];
            validate_rate(step, rate)?;
            validate_tail_flag(step, no_regression[step])?;
            Ok((step, 100.0 / rate))
        })
        .collect()
}
