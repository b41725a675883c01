//! Integration tests for the strategy search.
//!
//! 1. Dominance pruning never changes the optimum (random small catalogs)
//! 2. Reference-catalog scenarios end to end
//! 3. Scenario file → plan → artifacts

use std::collections::BTreeMap;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use upways_core::{AnalysisConfig, ComputationMode, Method, MethodId, StepData};
use upways_runner::catalog::ids;
use upways_runner::{
    dominates, load_artifacts, plan_scenario, reference_catalog, save_artifacts, MethodCatalog,
    OptimizerConfig, Scenario, StepOption, StrategyEnumerator,
};

// ── Helpers ──────────────────────────────────────────────────────────

/// A method with a full fixed table and price; `no_regression` as given.
#[derive(Debug, Clone)]
struct MethodSpec {
    rates: Vec<f64>,
    price: f64,
    no_regression: bool,
}

fn build_catalog(specs: &[MethodSpec], stone_price: f64) -> MethodCatalog {
    let mut methods: Vec<Method> = specs
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Method::new(format!("m{i}"), format!("Method {i}"))
                .with_fixed_rates(s.rates.clone())
                .with_price(s.price)
                .with_no_regression(s.no_regression)
        })
        .collect();
    methods.push(
        Method::new("stone", "Stone")
            .with_no_regression(true)
            .with_price(stone_price),
    );
    MethodCatalog::new(methods).unwrap()
}

/// Every step free, the stone offered everywhere, no thread pool.
fn free_config(pruning: bool) -> OptimizerConfig {
    OptimizerConfig::default()
        .with_forced_method(None, 0)
        .with_no_regression_method(MethodId::from("stone"))
        .with_pruning(pruning)
        .with_parallelism(false)
}

fn arb_method(steps: usize) -> impl Strategy<Value = MethodSpec> {
    (
        prop::collection::vec(prop::sample::select(vec![10.0, 25.0, 40.0, 50.0, 75.0, 100.0]), steps),
        prop::sample::select(vec![0.5, 1.0, 2.0, 3.0, 5.0]),
        prop::bool::weighted(0.2),
    )
        .prop_map(|(rates, price, no_regression)| MethodSpec {
            rates,
            price,
            no_regression,
        })
}

/// (methods, stone price, item rates) for 1..=5 free steps and 1..=3
/// methods besides the stone.
fn arb_catalog() -> impl Strategy<Value = (Vec<MethodSpec>, f64, Vec<f64>)> {
    (1usize..=5).prop_flat_map(|steps| {
        (
            prop::collection::vec(arb_method(steps), 1..=3),
            prop::sample::select(vec![1.0, 4.0, 8.0]),
            prop::collection::vec(20.0..=95.0_f64, steps),
        )
    })
}

// ── 1. Pruning equivalence ───────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pruning_preserves_the_minimum((specs, stone_price, item_rates) in arb_catalog()) {
        let steps = item_rates.len();
        let catalog = build_catalog(&specs, stone_price);
        let data: Vec<StepData> = item_rates.iter().map(|&r| StepData::new(r).with_base_cost(0.1)).collect();
        let analysis = AnalysisConfig::default();

        let pruned = StrategyEnumerator::new(&catalog, &data, free_config(true), analysis)
            .optimize(0, steps)
            .unwrap();
        let full = StrategyEnumerator::new(&catalog, &data, free_config(false), analysis)
            .optimize(0, steps)
            .unwrap();

        let tolerance = 1e-9 * full.expected_cost.max(1.0);
        prop_assert!((pruned.expected_cost - full.expected_cost).abs() <= tolerance,
            "pruned {} vs full {}", pruned.expected_cost, full.expected_cost);
        prop_assert!(pruned.candidates_evaluated <= full.candidates_evaluated);
        prop_assert_eq!(full.options_pruned, 0);
    }
}

#[test]
fn dominance_rule_examples() {
    let a = StepOption { method: 0, rate: 50.0, cost: 10.0, no_regression: false };
    let b = StepOption { method: 1, rate: 50.0, cost: 15.0, no_regression: false };
    let c = StepOption { method: 2, rate: 80.0, cost: 12.0, no_regression: false };
    assert!(dominates(&a, &b));
    assert!(!dominates(&a, &c));
    assert!(!dominates(&c, &a));
}

#[test]
fn pruning_shrinks_the_search_on_a_seeded_catalog() {
    let mut rng = StdRng::seed_from_u64(7);
    let steps = 5;
    let specs: Vec<MethodSpec> = (0..3)
        .map(|_| MethodSpec {
            rates: (0..steps).map(|_| rng.gen_range(10..=100) as f64).collect(),
            price: rng.gen_range(1..=6) as f64,
            no_regression: false,
        })
        .collect();
    // A clone of m0 that costs more is always dominated.
    let mut with_dominated = specs.clone();
    with_dominated.push(MethodSpec {
        price: specs[0].price + 1.0,
        ..specs[0].clone()
    });
    let catalog = build_catalog(&with_dominated, 3.0);
    let data: Vec<StepData> = (0..steps).map(|_| StepData::new(50.0)).collect();

    let pruned = StrategyEnumerator::new(&catalog, &data, free_config(true), AnalysisConfig::default())
        .optimize(0, steps)
        .unwrap();
    let full = StrategyEnumerator::new(&catalog, &data, free_config(false), AnalysisConfig::default())
        .optimize(0, steps)
        .unwrap();

    assert!(pruned.options_pruned >= steps);
    assert!(pruned.candidates_evaluated < full.candidates_evaluated);
    assert!((pruned.expected_cost - full.expected_cost).abs() < 1e-9 * full.expected_cost);
    for step in pruned.strategy.steps() {
        assert_ne!(step.method.as_str(), "m3");
    }
}

// ── 2. Reference catalog ─────────────────────────────────────────────

fn reference_prices() -> BTreeMap<String, f64> {
    BTreeMap::from([
        (ids::BLESSING_SCROLL.to_string(), 0.8),
        (ids::BLACKSMITH_MANUAL.to_string(), 9.0),
        (ids::DRAGON_GOD_SCROLL.to_string(), 4.0),
        (ids::WAR_SCROLL.to_string(), 0.2),
        (ids::MAGIC_STONE.to_string(), 6.0),
    ])
}

/// Item table shaped like a typical +0 → +15 weapon.
fn reference_levels() -> Vec<StepData> {
    [95.0, 90.0, 85.0, 80.0, 60.0, 50.0, 40.0, 30.0, 20.0, 15.0, 12.0, 10.0, 8.0, 6.0, 5.0]
        .iter()
        .map(|&r| StepData::new(r).with_base_cost(0.05).with_material("ore", 0.1, 1.0))
        .collect()
}

#[test]
fn reference_plan_uses_war_scroll_then_stone() {
    let catalog = reference_catalog().with_prices(&reference_prices()).unwrap();
    let data = reference_levels();
    let best = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default(), AnalysisConfig::default())
        .optimize(0, 15)
        .unwrap();

    assert_eq!(best.mode, ComputationMode::Mixed);
    let steps = best.strategy.steps();
    for s in &steps[..4] {
        assert_eq!(s.method.as_str(), ids::WAR_SCROLL);
        assert_eq!(s.success_rate, 100.0);
    }
    for s in &steps[9..] {
        assert_eq!(s.method.as_str(), ids::MAGIC_STONE);
    }
    assert!(best.expected_cost.is_finite() && best.expected_cost > 0.0);
    assert!(best.total_trials >= 15.0);
}

#[test]
fn raising_the_stone_price_never_lowers_the_optimum() {
    let data = reference_levels();
    let mut last = 0.0;
    for stone in [1.0, 3.0, 6.0, 12.0] {
        let mut prices = reference_prices();
        prices.insert(ids::MAGIC_STONE.to_string(), stone);
        let catalog = reference_catalog().with_prices(&prices).unwrap();
        let best = StrategyEnumerator::new(&catalog, &data, OptimizerConfig::default(), AnalysisConfig::default())
            .optimize(0, 12)
            .unwrap();
        assert!(best.expected_cost >= last - 1e-9);
        last = best.expected_cost;
    }
}

#[test]
fn ties_resolve_to_the_first_method_in_catalog_order() {
    // Two identical methods: the first one listed must win every step.
    let catalog = MethodCatalog::new(vec![
        Method::new("first", "First").with_price(1.0),
        Method::new("second", "Second").with_price(1.0),
        Method::new("stone", "Stone").with_no_regression(true).with_price(50.0),
    ])
    .unwrap();
    let data: Vec<StepData> = (0..4).map(|_| StepData::new(60.0)).collect();
    for pruning in [true, false] {
        let cfg = free_config(pruning).with_parallelism(true);
        let best = StrategyEnumerator::new(&catalog, &data, cfg, AnalysisConfig::default())
            .optimize(0, 4)
            .unwrap();
        assert!(best.strategy.steps().iter().all(|s| s.method.as_str() == "first"));
    }
}

// ── 3. Scenario end to end ───────────────────────────────────────────

const SCENARIO: &str = r#"
start_level = 2
end_level = 11

[optimizer]
max_candidates = 100000

[prices.methods]
blessing_scroll = 0.8
blacksmith_manual = 9.0
dragon_god_scroll = 4.0
war_scroll = 0.2
magic_stone = 6.0

[prices.materials]
ore = 0.1

[[levels]]
success_rate = 95
materials = { ore = 1 }
[[levels]]
success_rate = 90
materials = { ore = 1 }
[[levels]]
success_rate = 85
materials = { ore = 1 }
[[levels]]
success_rate = 80
materials = { ore = 1 }
[[levels]]
success_rate = 60
materials = { ore = 2 }
[[levels]]
success_rate = 50
materials = { ore = 2 }
[[levels]]
success_rate = 40
materials = { ore = 2 }
[[levels]]
success_rate = 30
materials = { ore = 3 }
[[levels]]
success_rate = 20
materials = { ore = 3 }
[[levels]]
success_rate = 15
base_cost = 0.5
[[levels]]
success_rate = 12
base_cost = 0.5

[[custom_path]]
step = 4
method = "blacksmith_manual"

[[custom_path]]
step = 5
method = "blacksmith_manual"
"#;

#[test]
fn scenario_plan_and_artifacts() {
    let scenario = Scenario::from_toml(SCENARIO).unwrap();
    let plan = plan_scenario(&scenario).unwrap();

    assert_eq!(plan.optimal.start_level, 2);
    assert_eq!(plan.optimal.steps.len(), 9);
    assert!(plan.optimal.candidates_evaluated.unwrap() > 1);

    let custom = plan.custom.as_ref().unwrap();
    assert_eq!(custom.steps[2].method.as_str(), ids::BLACKSMITH_MANUAL);
    let cmp = plan.comparison.as_ref().unwrap();
    assert!(cmp.extra_cost >= -1e-9, "custom plan beat the optimum");

    let dir = tempfile::tempdir().unwrap();
    let run_dir = save_artifacts(&plan.optimal, dir.path()).unwrap();
    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.fingerprint, plan.optimal.fingerprint);
    assert_eq!(loaded.steps.len(), plan.optimal.steps.len());
}

#[test]
fn scenario_budget_too_small() {
    let toml = SCENARIO.replace("max_candidates = 100000", "max_candidates = 2");
    let scenario = Scenario::from_toml(&toml).unwrap();
    let err = plan_scenario(&scenario).unwrap_err();
    assert!(err.to_string().contains("exceed the budget"));
}
