//! Exact distribution of the number of attempts needed to cross a range.
//!
//! Below the bounded-range limit the probability of finishing on attempt `t`
//! is `(Qᵗ⁻¹)[start][last] · rate_last`; the row `e_start · Qᵗ⁻¹` is carried
//! forward one vector-matrix product at a time. Tail steps are independent
//! geometric trials: steps sharing a rate `p` are grouped, `k` of them need a
//! negative-binomial number of attempts, and all groups (and the Markov part,
//! if any) are combined by discrete convolution.
//!
//! Every loop stops once the running cumulative mass exceeds
//! `cumulative_threshold` or the trial count passes `max_trial`, so the
//! result is always finite.

use serde::{Deserialize, Serialize};

use crate::chain::{AbsorbingChain, ComputationMode};
use crate::config::AnalysisConfig;
use crate::domain::Strategy;
use crate::error::{validate_rate, validate_tail_flag, CoreError};

/// Probability of finishing on exactly `trials` attempts, with the running total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionPoint {
    pub trials: usize,
    pub probability: f64,
    pub cumulative: f64,
}

/// Quantiles of the trial count read off the exact distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: Option<usize>,
    pub p25: Option<usize>,
    pub p50: Option<usize>,
    pub p75: Option<usize>,
    pub p95: Option<usize>,
}

/// Probability mass function over the trial count, indexed by trial count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pmf: Vec<f64>,
    min_trials: usize,
}

impl Distribution {
    fn new(pmf: Vec<f64>, min_trials: usize) -> Self {
        Self { pmf, min_trials }
    }

    /// Smallest possible trial count (the number of steps to cross).
    pub fn min_trials(&self) -> usize {
        self.min_trials
    }

    /// Largest trial count carried before truncation.
    pub fn max_trials(&self) -> usize {
        self.pmf.len().saturating_sub(1)
    }

    pub fn pmf(&self) -> &[f64] {
        &self.pmf
    }

    /// Probability of finishing on exactly `trials` attempts.
    pub fn probability_at(&self, trials: usize) -> f64 {
        self.pmf.get(trials).copied().unwrap_or(0.0)
    }

    /// Probability of finishing within `trials` attempts.
    pub fn probability_within(&self, trials: usize) -> f64 {
        let upto = trials.min(self.max_trials());
        self.pmf[..=upto].iter().sum()
    }

    /// Mass retained after truncation.
    pub fn total_mass(&self) -> f64 {
        self.pmf.iter().sum()
    }

    /// Mean of the retained mass, renormalised.
    pub fn mean(&self) -> f64 {
        let mass = self.total_mass();
        if mass <= 0.0 {
            return 0.0;
        }
        self.pmf
            .iter()
            .enumerate()
            .map(|(t, p)| t as f64 * p)
            .sum::<f64>()
            / mass
    }

    /// Smallest trial count whose cumulative probability reaches `q`, or
    /// `None` when the truncated distribution never gets there.
    pub fn quantile(&self, q: f64) -> Option<usize> {
        let mut cumulative = 0.0;
        for (trials, p) in self.pmf.iter().enumerate() {
            cumulative += p;
            if cumulative >= q {
                return Some(trials);
            }
        }
        None
    }

    pub fn percentiles(&self) -> Percentiles {
        Percentiles {
            p5: self.quantile(0.05),
            p25: self.quantile(0.25),
            p50: self.quantile(0.50),
            p75: self.quantile(0.75),
            p95: self.quantile(0.95),
        }
    }

    /// `(trials, probability, cumulative)` from `min_trials` onwards.
    pub fn points(&self) -> Vec<DistributionPoint> {
        let mut cumulative: f64 = self.pmf[..self.min_trials.min(self.pmf.len())].iter().sum();
        self.pmf
            .iter()
            .enumerate()
            .skip(self.min_trials)
            .map(|(trials, &probability)| {
                cumulative += probability;
                DistributionPoint {
                    trials,
                    probability,
                    cumulative,
                }
            })
            .collect()
    }
}

/// Trial-count distribution for `strategy`.
pub fn trial_distribution(strategy: &Strategy, config: &AnalysisConfig) -> Result<Distribution, CoreError> {
    config.validate()?;
    let start = strategy.start_level();
    let end = strategy.end_level();
    let rates = strategy.success_rates();
    let bounded_end = config.bounded_end(end);

    let has_chain = start < bounded_end;
    let tail_from = start.max(config.bounded_range_limit);
    let flags = strategy.no_regression_flags();
    let groups = group_tail_rates(&rates, &flags, tail_from, end)?;

    // Each truncated component loses mass; components are cut tighter so the
    // convolved result still reaches the requested threshold.
    let components = groups.len() + usize::from(has_chain);
    let component_cfg = config.with_cumulative_threshold(component_threshold(
        config.cumulative_threshold,
        components,
    ));

    let mut pmf = vec![1.0];
    if has_chain {
        let chain = AbsorbingChain::new(
            &rates[..bounded_end],
            &flags[..bounded_end],
            start,
        )?;
        pmf = markov_pmf(&chain, &component_cfg);
    }

    for (rate, count) in groups {
        let group = negative_binomial_pmf(count, rate / 100.0, &component_cfg);
        pmf = convolve(&pmf, &group, config);
    }

    tracing::debug!(
        mode = ?ComputationMode::for_range(start, end, config.bounded_range_limit),
        length = pmf.len(),
        "trial distribution computed"
    );
    Ok(Distribution::new(pmf, strategy.min_trials()))
}

/// Threshold each of `components` pmfs is cut at so that their convolution
/// can still exceed `threshold`.
fn component_threshold(threshold: f64, components: usize) -> f64 {
    if components <= 1 {
        threshold
    } else {
        1.0 - (1.0 - threshold) / (components + 1) as f64
    }
}

/// Absorption-time pmf of `chain`; index 0 holds zero mass.
pub fn markov_pmf(chain: &AbsorbingChain, config: &AnalysisConfig) -> Vec<f64> {
    let last = chain.size() - 1;
    let mut row = vec![0.0; chain.size()];
    row[chain.start()] = 1.0;

    let mut pmf = vec![0.0];
    let mut cumulative = 0.0;
    for _trial in 1..=config.max_trial {
        let p = row[last] * chain.last_success();
        pmf.push(p);
        cumulative += p;
        if cumulative > config.cumulative_threshold {
            break;
        }
        row = chain.q().left_multiply(&row);
    }
    pmf
}

/// Distinct tail rates with their multiplicity, in first-seen order.
fn group_tail_rates(
    rates: &[f64],
    no_regression: &[bool],
    from: usize,
    to: usize,
) -> Result<Vec<(f64, usize)>, CoreError> {
    let mut groups: Vec<(f64, usize)> = Vec::new();
    for (step, &rate) in rates.iter().enumerate().take(to).skip(from) {
        validate_rate(step, rate)?;
        validate_tail_flag(step, no_regression[step])?;
        match groups.iter_mut().find(|(r, _)| *r == rate) {
            Some((_, count)) => *count += 1,
            None => groups.push((rate, 1)),
        }
    }
    Ok(groups)
}

/// `P(n) = C(n-1, k-1) · pᵏ · (1-p)ⁿ⁻ᵏ` for `n ≥ k`, indexed by `n`.
///
/// Terms are built by the ratio `P(n+1) / P(n) = n / (n+1-k) · (1-p)` so the
/// binomial coefficient never materialises.
pub fn negative_binomial_pmf(k: usize, p: f64, config: &AnalysisConfig) -> Vec<f64> {
    if k == 0 {
        return vec![1.0];
    }
    let mut pmf = vec![0.0; k];
    let mut term = p.powi(k as i32);
    let mut cumulative = 0.0;
    let mut n = k;
    loop {
        pmf.push(term);
        cumulative += term;
        if cumulative > config.cumulative_threshold || n >= config.max_trial {
            break;
        }
        term *= n as f64 / (n + 1 - k) as f64 * (1.0 - p);
        n += 1;
    }
    pmf
}

/// Discrete convolution of two pmfs, truncated once the running cumulative
/// mass exceeds the threshold or the index passes `max_trial`.
pub fn convolve(a: &[f64], b: &[f64], config: &AnalysisConfig) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let full_len = a.len() + b.len() - 1;
    let len = full_len.min(config.max_trial + 1);
    let mut out = Vec::with_capacity(len);
    let mut cumulative = 0.0;
    for n in 0..len {
        let lo = n.saturating_sub(b.len() - 1);
        let hi = n.min(a.len() - 1);
        let mass: f64 = (lo..=hi).map(|i| a[i] * b[n - i]).sum();
        out.push(mass);
        cumulative += mass;
        if cumulative > config.cumulative_threshold {
            break;
        }
    }
    out
}
