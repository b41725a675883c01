//! Dominance pruning of per-step method options.
//!
//! Option A dominates B when it is at least as likely to succeed, at most as
//! expensive, strictly better in one of the two, and regresses no more than B.
//! A dominated option can be swapped for its dominator in any plan without
//! raising expected visits at any level, so dropping it never changes the
//! minimum.

/// One admissible method at one step, reduced to what the search compares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOption {
    /// Index into the method catalog.
    pub method: usize,
    pub rate: f64,
    pub cost: f64,
    pub no_regression: bool,
}

pub fn dominates(a: &StepOption, b: &StepOption) -> bool {
    let no_worse = a.rate >= b.rate && a.cost <= b.cost && (a.no_regression || !b.no_regression);
    let strictly_better =
        a.rate > b.rate || a.cost < b.cost || (a.no_regression && !b.no_regression);
    no_worse && strictly_better
}

fn same_outcome(a: &StepOption, b: &StepOption) -> bool {
    a.rate == b.rate && a.cost == b.cost && a.no_regression == b.no_regression
}

/// Drops dominated options and collapses identical ones to their first
/// occurrence. Survivors keep their input order.
pub fn filter_dominated(options: &[StepOption]) -> Vec<StepOption> {
    let mut kept: Vec<StepOption> = Vec::with_capacity(options.len());
    for candidate in options {
        if options.iter().any(|other| dominates(other, candidate)) {
            continue;
        }
        if kept.iter().any(|k| same_outcome(k, candidate)) {
            continue;
        }
        kept.push(*candidate);
    }
    kept
}
