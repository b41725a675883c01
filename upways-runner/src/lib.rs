//! Upways Runner — strategy search, custom plans, scenarios and export.
//!
//! This crate builds on `upways-core` to provide:
//! - Method catalogs, including the reference scroll catalog
//! - Dominance pruning and the exhaustive strategy enumerator (rayon fan-out)
//! - Custom plan validation and completion
//! - TOML scenario files
//! - Per-step reports, optimal-vs-custom comparison, JSON/CSV/Markdown export

pub mod catalog;
pub mod config;
pub mod custom;
pub mod dominance;
pub mod enumerator;
pub mod export;
pub mod plan;
pub mod report;
pub mod scenario;

pub use catalog::{reference_catalog, MethodCatalog};
pub use config::OptimizerConfig;
pub use custom::build_custom_strategy;
pub use dominance::{dominates, filter_dominated, StepOption};
pub use enumerator::{OptimalStrategy, OptimizeError, StrategyEnumerator};
pub use export::{
    export_distribution_csv, export_json, export_steps_csv, generate_comparison, generate_report,
    import_json, load_artifacts, save_artifacts,
};
pub use plan::{analyze_custom, optimize_scenario, plan_scenario, Plan, PlanError};
pub use report::{compare, fingerprint, Comparison, StepBreakdown, StrategyReport, SCHEMA_VERSION};
pub use scenario::{CustomAssignment, LevelSpec, PriceBook, Scenario, ScenarioError};
