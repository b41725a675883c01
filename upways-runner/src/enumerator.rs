//! Exhaustive strategy search with dominance pruning.
//!
//! Every step of the bounded range gets a list of admissible options; the
//! search space is their cartesian product in lexicographic order, addressed
//! by candidate index so it is never materialized. Candidates are evaluated
//! independently (optionally across the rayon pool) and reduced on
//! `(cost, index)`: the cheapest one wins, earliest in enumeration order on
//! ties.

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use upways_core::{
    expected_total_cost, expected_visits, AnalysisConfig, ComputationMode, CoreError, Method,
    MethodId, StepData, Strategy,
};

use crate::catalog::MethodCatalog;
use crate::config::OptimizerConfig;
use crate::dominance::{filter_dominated, StepOption};

/// Errors from the optimizer and the custom plan builder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("analysis error: {0}")]
    Core(#[from] CoreError),
    #[error("unknown method '{0}'")]
    UnknownMethod(MethodId),
    #[error("method '{0}' appears twice in the catalog")]
    DuplicateMethod(MethodId),
    #[error("no-regression method '{0}' regresses on failure")]
    RegressingNoRegressionMethod(MethodId),
    #[error("method '{method}' cannot be used at step {step}")]
    MethodUnavailable { method: MethodId, step: usize },
    #[error("no admissible method at step {step}")]
    NoCandidates { step: usize },
    #[error("{candidates} candidate strategies exceed the budget of {budget}")]
    CandidateBudgetExceeded { candidates: usize, budget: usize },
}

/// The cheapest plan found and how the search got there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimalStrategy {
    pub strategy: Strategy,
    pub expected_cost: f64,
    pub total_trials: f64,
    pub mode: ComputationMode,
    pub candidates_evaluated: usize,
    /// Options removed by dominance, summed over steps.
    pub options_pruned: usize,
}

struct Evaluated {
    strategy: Strategy,
    cost: f64,
    trials: f64,
    mode: ComputationMode,
}

/// Running state of the reduction over candidate results.
#[derive(Default)]
struct Search {
    best: Option<(usize, Evaluated)>,
    first_error: Option<(usize, OptimizeError)>,
    skipped: usize,
}

impl Search {
    fn record(mut self, index: usize, result: Result<Evaluated, OptimizeError>) -> Self {
        match result {
            Ok(candidate) => self.offer(index, candidate),
            Err(err) => {
                self.skipped += 1;
                self.offer_error(index, err);
            }
        }
        self
    }

    fn merge(mut self, other: Search) -> Self {
        if let Some((index, candidate)) = other.best {
            self.offer(index, candidate);
        }
        if let Some((index, err)) = other.first_error {
            self.offer_error(index, err);
        }
        self.skipped += other.skipped;
        self
    }

    fn offer(&mut self, index: usize, candidate: Evaluated) {
        let wins = match &self.best {
            None => true,
            Some((best_index, best)) => {
                candidate.cost < best.cost || (candidate.cost == best.cost && index < *best_index)
            }
        };
        if wins {
            self.best = Some((index, candidate));
        }
    }

    fn offer_error(&mut self, index: usize, err: OptimizeError) {
        if self.first_error.as_ref().map_or(true, |(i, _)| index < *i) {
            self.first_error = Some((index, err));
        }
    }
}

/// Searches a catalog for the minimum expected-cost assignment.
pub struct StrategyEnumerator<'a> {
    catalog: &'a MethodCatalog,
    steps: &'a [StepData],
    config: OptimizerConfig,
    analysis: AnalysisConfig,
}

impl<'a> StrategyEnumerator<'a> {
    pub fn new(
        catalog: &'a MethodCatalog,
        steps: &'a [StepData],
        config: OptimizerConfig,
        analysis: AnalysisConfig,
    ) -> Self {
        Self {
            catalog,
            steps,
            config,
            analysis,
        }
    }

    /// Admissible options at `step` after pruning, in catalog order, with the
    /// no-regression method last once past the forced range.
    pub fn step_options(&self, step: usize) -> Result<Vec<StepOption>, OptimizeError> {
        self.options_at(step).map(|(options, _)| options)
    }

    /// Runs the search for `[start_level, end_level)`.
    pub fn optimize(&self, start_level: usize, end_level: usize) -> Result<OptimalStrategy, OptimizeError> {
        if start_level >= end_level || self.steps.len() < end_level {
            return Err(CoreError::InvalidRange {
                start: start_level,
                end: end_level,
                available: self.steps.len(),
            }
            .into());
        }
        self.analysis.validate()?;
        self.config.validate(self.catalog)?;

        let bounded_end = self.analysis.bounded_end(end_level);
        if start_level >= bounded_end {
            return self.tail_only(start_level, end_level);
        }

        let mut table = Vec::with_capacity(bounded_end);
        let mut options_pruned = 0;
        for step in 0..bounded_end {
            let (options, pruned) = self.options_at(step)?;
            options_pruned += pruned;
            table.push(options);
        }

        let candidates = candidate_count(&table);
        debug!(
            steps = bounded_end,
            candidates,
            options_pruned,
            "enumerating strategies"
        );
        if let Some(budget) = self.config.max_candidates {
            if candidates > budget {
                return Err(OptimizeError::CandidateBudgetExceeded { candidates, budget });
            }
        }

        let tail = self.tail_methods(bounded_end, end_level)?;
        let evaluate_index = |index: usize| {
            let methods: Vec<&Method> = path_at(&table, index)
                .map(|option| &self.catalog.methods()[option.method])
                .chain(tail.iter().copied())
                .collect();
            (index, self.evaluate(start_level, end_level, &methods))
        };

        let search = if self.config.parallel {
            (0..candidates)
                .into_par_iter()
                .map(evaluate_index)
                .fold(Search::default, |acc, (index, result)| acc.record(index, result))
                .reduce(Search::default, Search::merge)
        } else {
            (0..candidates)
                .map(evaluate_index)
                .fold(Search::default(), |acc, (index, result)| acc.record(index, result))
        };
        if search.skipped > 0 {
            debug!(skipped = search.skipped, "candidates rejected during evaluation");
        }

        match search.best {
            Some((_, best)) => {
                info!(
                    cost = best.cost,
                    trials = best.trials,
                    candidates,
                    "optimal strategy selected"
                );
                Ok(OptimalStrategy {
                    strategy: best.strategy,
                    expected_cost: best.cost,
                    total_trials: best.trials,
                    mode: best.mode,
                    candidates_evaluated: candidates,
                    options_pruned,
                })
            }
            None => Err(search
                .first_error
                .map(|(_, err)| err)
                .unwrap_or(OptimizeError::NoCandidates { step: start_level })),
        }
    }

    /// Start already at or past the bounded range: nothing to search.
    fn tail_only(&self, start_level: usize, end_level: usize) -> Result<OptimalStrategy, OptimizeError> {
        let stone = self.catalog.get(&self.config.no_regression_method)?;
        let mut methods = vec![stone; start_level];
        methods.extend(self.tail_methods(start_level, end_level)?);
        let best = self.evaluate(start_level, end_level, &methods)?;
        info!(cost = best.cost, trials = best.trials, "tail-only strategy");
        Ok(OptimalStrategy {
            strategy: best.strategy,
            expected_cost: best.cost,
            total_trials: best.trials,
            mode: best.mode,
            candidates_evaluated: 1,
            options_pruned: 0,
        })
    }

    /// The no-regression method for every step in `[from, to)`.
    fn tail_methods(&self, from: usize, to: usize) -> Result<Vec<&'a Method>, OptimizeError> {
        (from..to)
            .map(|step| self.resolve(&self.config.no_regression_method, step).map(|(_, m)| m))
            .collect()
    }

    fn resolve(&self, id: &MethodId, step: usize) -> Result<(usize, &'a Method), OptimizeError> {
        let index = self
            .catalog
            .position(id)
            .ok_or_else(|| OptimizeError::UnknownMethod(id.clone()))?;
        let method = &self.catalog.methods()[index];
        if !method.is_available_at(step) {
            return Err(OptimizeError::MethodUnavailable {
                method: id.clone(),
                step,
            });
        }
        Ok((index, method))
    }

    fn option(&self, index: usize, method: &Method, step: usize) -> StepOption {
        let data = &self.steps[step];
        StepOption {
            method: index,
            rate: method.rate_at(step, data),
            cost: method.cost_at(data),
            no_regression: method.no_regression,
        }
    }

    /// Options at `step` and how many pruning removed.
    fn options_at(&self, step: usize) -> Result<(Vec<StepOption>, usize), OptimizeError> {
        if step >= self.steps.len() {
            return Err(OptimizeError::NoCandidates { step });
        }
        if step < self.config.forced_below {
            if let Some(forced) = &self.config.forced_method {
                let (index, method) = self.resolve(forced, step)?;
                return Ok((vec![self.option(index, method, step)], 0));
            }
        }

        let free: Vec<StepOption> = self
            .catalog
            .methods()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.id != self.config.no_regression_method && m.is_available_at(step))
            .map(|(i, m)| self.option(i, m, step))
            .collect();
        let before = free.len();
        let mut options = if self.config.pruning {
            filter_dominated(&free)
        } else {
            free
        };
        let pruned = before - options.len();

        if step >= self.config.forced_below {
            let (index, method) = self.resolve(&self.config.no_regression_method, step)?;
            options.push(self.option(index, method, step));
        }
        if options.is_empty() {
            return Err(OptimizeError::NoCandidates { step });
        }
        Ok((options, pruned))
    }

    fn evaluate(&self, start_level: usize, end_level: usize, methods: &[&Method]) -> Result<Evaluated, OptimizeError> {
        let strategy = Strategy::from_methods(start_level, end_level, methods, self.steps)?;
        let visits = expected_visits(&strategy, &self.analysis)?;
        let cost = expected_total_cost(&visits.waypoints, &strategy.costs());
        Ok(Evaluated {
            strategy,
            cost,
            trials: visits.total_trials,
            mode: visits.mode,
        })
    }
}

/// Size of the cartesian product, saturating on overflow.
fn candidate_count(table: &[Vec<StepOption>]) -> usize {
    table
        .iter()
        .try_fold(1usize, |acc, options| acc.checked_mul(options.len()))
        .unwrap_or(usize::MAX)
}

/// Options of candidate `index` over `table` in lexicographic order, first
/// step varying slowest.
fn path_at(table: &[Vec<StepOption>], mut index: usize) -> impl Iterator<Item = StepOption> + '_ {
    let mut picks = vec![0; table.len()];
    for (pick, options) in picks.iter_mut().zip(table).rev() {
        *pick = index % options.len();
        index /= options.len();
    }
    picks.into_iter().zip(table).map(|(pick, options)| options[pick])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ids, reference_catalog};
    use std::collections::BTreeMap;

    fn priced_reference() -> MethodCatalog {
        let prices = BTreeMap::from([
            (ids::BLESSING_SCROLL.to_string(), 1.0),
            (ids::BLACKSMITH_MANUAL.to_string(), 6.0),
            (ids::DRAGON_GOD_SCROLL.to_string(), 3.0),
            (ids::WAR_SCROLL.to_string(), 0.5),
            (ids::MAGIC_STONE.to_string(), 4.0),
        ]);
        reference_catalog().with_prices(&prices).unwrap()
    }

    fn item_rates(n: usize) -> Vec<StepData> {
        (0..n)
            .map(|i| StepData::new((90.0 - i as f64 * 7.0).max(5.0)).with_base_cost(0.1))
            .collect()
    }

    fn opt(method: usize, rate: f64) -> StepOption {
        StepOption {
            method,
            rate,
            cost: 1.0,
            no_regression: false,
        }
    }

    #[test]
    fn expansion_is_lexicographic() {
        let table = vec![vec![opt(0, 1.0), opt(1, 1.0)], vec![opt(2, 1.0), opt(3, 1.0), opt(4, 1.0)]];
        let count = candidate_count(&table);
        assert_eq!(count, 6);
        let paths: Vec<Vec<usize>> = (0..count)
            .map(|i| path_at(&table, i).map(|o| o.method).collect())
            .collect();
        assert_eq!(
            paths,
            vec![vec![0, 2], vec![0, 3], vec![0, 4], vec![1, 2], vec![1, 3], vec![1, 4]]
        );
        assert_eq!(candidate_count(&[]), 1);
        assert_eq!(path_at(&[], 0).count(), 0);
    }

    #[test]
    fn forced_steps_have_a_single_option() {
        let catalog = priced_reference();
        let data = item_rates(10);
        let e = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default(), AnalysisConfig::default());
        for step in 0..4 {
            let options = e.step_options(step).unwrap();
            assert_eq!(options.len(), 1);
            assert_eq!(catalog.methods()[options[0].method].id.as_str(), ids::WAR_SCROLL);
        }
        let at_five = e.step_options(5).unwrap();
        let last = at_five.last().unwrap();
        assert_eq!(catalog.methods()[last.method].id.as_str(), ids::MAGIC_STONE);
        assert!(at_five.iter().all(|o| o.rate > 0.0));
    }

    #[test]
    fn war_scroll_is_unavailable_past_its_table() {
        let catalog = priced_reference();
        let data = item_rates(10);
        let cfg = OptimizerConfig::default().with_forced_method(Some(MethodId::from(ids::WAR_SCROLL)), 6);
        let e = StrategyEnumerator::new(&catalog, &data, cfg, AnalysisConfig::default());
        assert_eq!(
            e.step_options(4),
            Err(OptimizeError::MethodUnavailable {
                method: MethodId::from(ids::WAR_SCROLL),
                step: 4
            })
        );
    }

    #[test]
    fn optimum_beats_every_fixed_plan() {
        let catalog = priced_reference();
        let data = item_rates(9);
        let cfg = OptimizerConfig::default().with_parallelism(false);
        let e = StrategyEnumerator::new(&catalog, &data, cfg, AnalysisConfig::default());
        let best = e.optimize(0, 9).unwrap();
        assert_eq!(best.strategy.end_level(), 9);
        assert_eq!(best.mode, ComputationMode::Markov);

        // Any single scroll used from step 4 on is no cheaper.
        let war = catalog.get(&MethodId::from(ids::WAR_SCROLL)).unwrap();
        for id in [ids::BLESSING_SCROLL, ids::BLACKSMITH_MANUAL, ids::DRAGON_GOD_SCROLL, ids::MAGIC_STONE] {
            let m = catalog.get(&MethodId::from(id)).unwrap();
            let mut methods = vec![war; 4];
            methods.extend(std::iter::repeat(m).take(5));
            let s = Strategy::from_methods(0, 9, &methods, &data).unwrap();
            let v = expected_visits(&s, &AnalysisConfig::default()).unwrap();
            let cost = expected_total_cost(&v.waypoints, &s.costs());
            assert!(best.expected_cost <= cost + 1e-9, "{id} beat the optimum");
        }
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let catalog = priced_reference();
        let data = item_rates(12);
        let analysis = AnalysisConfig::default();
        let seq = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default().with_parallelism(false), analysis)
            .optimize(2, 12)
            .unwrap();
        let par = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default(), analysis)
            .optimize(2, 12)
            .unwrap();
        assert_eq!(seq.strategy, par.strategy);
        assert_eq!(seq.expected_cost, par.expected_cost);
        assert_eq!(par.mode, ComputationMode::Mixed);
    }

    #[test]
    fn tail_steps_use_the_no_regression_method() {
        let catalog = priced_reference();
        let data = item_rates(12);
        let best = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default(), AnalysisConfig::default())
            .optimize(0, 12)
            .unwrap();
        for step in &best.strategy.steps()[9..] {
            assert_eq!(step.method.as_str(), ids::MAGIC_STONE);
            assert!(step.no_regression);
        }
    }

    #[test]
    fn start_past_the_limit_skips_the_search() {
        let catalog = priced_reference();
        let data = item_rates(13);
        let best = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default(), AnalysisConfig::default())
            .optimize(10, 13)
            .unwrap();
        assert_eq!(best.candidates_evaluated, 1);
        assert_eq!(best.mode, ComputationMode::Direct);
        let expected: f64 = data[10..13].iter().map(|d| 100.0 / d.success_rate).sum();
        assert!((best.total_trials - expected).abs() < 1e-9);
    }

    #[test]
    fn budget_is_enforced_before_evaluation() {
        let catalog = priced_reference();
        let data = item_rates(9);
        let cfg = OptimizerConfig::default().with_max_candidates(3);
        let err = StrategyEnumerator::new(&catalog, &data, cfg, AnalysisConfig::default())
            .optimize(0, 9)
            .unwrap_err();
        assert!(matches!(err, OptimizeError::CandidateBudgetExceeded { budget: 3, .. }));
    }

    #[test]
    fn invalid_range_is_rejected() {
        let catalog = priced_reference();
        let data = item_rates(5);
        let e = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default(), AnalysisConfig::default());
        assert!(matches!(
            e.optimize(3, 3),
            Err(OptimizeError::Core(CoreError::InvalidRange { .. }))
        ));
        assert!(matches!(
            e.optimize(0, 8),
            Err(OptimizeError::Core(CoreError::InvalidRange { available: 5, .. }))
        ));
    }

    #[test]
    fn unreachable_candidates_are_skipped() {
        // The item's own rate is zero at step 5, so the dynamic methods are
        // unusable there but the fixed tables still reach the target.
        let catalog = priced_reference();
        let mut data = item_rates(7);
        data[5] = StepData::new(0.0);
        let best = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default(), AnalysisConfig::default())
            .optimize(0, 7)
            .unwrap();
        assert!(best.strategy.steps()[5].success_rate > 0.0);
    }

    #[test]
    fn all_candidates_failing_reports_the_first_error() {
        let catalog = MethodCatalog::new(vec![
            Method::new("plain", "Plain"),
            Method::new("stone", "Stone").with_no_regression(true),
        ])
        .unwrap();
        let data = vec![StepData::new(50.0), StepData::new(0.0)];
        let cfg = OptimizerConfig::default()
            .with_forced_method(None, 0)
            .with_no_regression_method(MethodId::from("stone"));
        let err = StrategyEnumerator::new(&catalog, &data, cfg, AnalysisConfig::default())
            .optimize(0, 2)
            .unwrap_err();
        assert_eq!(err, OptimizeError::Core(CoreError::UnreachableTarget { step: 1 }));
    }

    #[test]
    fn regressing_no_regression_method_is_refused() {
        // Priced as a stone past +2 this would report 10 trials instead of 20.
        let catalog = MethodCatalog::new(vec![Method::new("plain", "Plain")]).unwrap();
        let data: Vec<StepData> = (0..4).map(|_| StepData::new(50.0)).collect();
        let cfg = OptimizerConfig::default()
            .with_forced_method(None, 0)
            .with_no_regression_method(MethodId::from("plain"))
            .with_parallelism(false);
        let analysis = AnalysisConfig::default().with_bounded_range_limit(2);
        let enumerator = StrategyEnumerator::new(&catalog, &data, cfg, analysis);
        for (start, end) in [(0, 4), (3, 4), (0, 1)] {
            assert_eq!(
                enumerator.optimize(start, end).unwrap_err(),
                OptimizeError::RegressingNoRegressionMethod(MethodId::from("plain"))
            );
        }
    }

    #[test]
    fn parallel_and_serial_searches_agree() {
        let catalog = priced_reference();
        let data = item_rates(9);
        let serial = StrategyEnumerator::new(
            &catalog,
            &data,
            OptimizerConfig::default().with_parallelism(false),
            AnalysisConfig::default(),
        )
        .optimize(0, 9)
        .unwrap();
        let parallel = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default(), AnalysisConfig::default())
            .optimize(0, 9)
            .unwrap();
        assert_eq!(serial.strategy, parallel.strategy);
        assert_eq!(serial.expected_cost, parallel.expected_cost);
        assert_eq!(serial.candidates_evaluated, parallel.candidates_evaluated);
    }
}
