//! Scenario files — everything one planning run needs, in TOML.
//!
//! ```toml
//! start_level = 0
//! end_level = 12
//!
//! [analysis]
//! bounded_range_limit = 9
//!
//! [optimizer]
//! pruning = true
//!
//! [prices.methods]
//! blessing_scroll = 1.2
//! magic_stone = 3.5
//!
//! [prices.materials]
//! ore = 0.4
//!
//! [[levels]]
//! success_rate = 90
//! base_cost = 0.05
//! materials = { ore = 2 }
//!
//! [[custom_path]]
//! step = 5
//! method = "blessing_scroll"
//! ```
//!
//! `[[methods]]` replaces the reference catalog when present.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use upways_core::{AnalysisConfig, Method, MethodId, StepData};

use crate::catalog::{reference_catalog, MethodCatalog};
use crate::config::OptimizerConfig;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// Item data for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSpec {
    /// The item's own rate, used by methods without a fixed table.
    pub success_rate: f64,
    /// Flat fee per attempt.
    #[serde(default)]
    pub base_cost: f64,
    /// Material id → quantity consumed per attempt.
    #[serde(default)]
    pub materials: BTreeMap<String, f64>,
}

/// Method prices and material unit costs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceBook {
    pub methods: BTreeMap<String, f64>,
    pub materials: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAssignment {
    pub step: usize,
    pub method: MethodId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub start_level: usize,
    pub end_level: usize,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    pub levels: Vec<LevelSpec>,
    #[serde(default)]
    pub prices: PriceBook,
    #[serde(default)]
    pub methods: Option<Vec<Method>>,
    #[serde(default)]
    pub custom_path: Vec<CustomAssignment>,
}

impl Scenario {
    /// Load and validate a scenario from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a scenario from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.start_level >= self.end_level {
            return Err(ScenarioError::Invalid(format!(
                "start_level ({}) must be below end_level ({})",
                self.start_level, self.end_level
            )));
        }
        if self.levels.len() < self.end_level {
            return Err(ScenarioError::Invalid(format!(
                "{} levels given, end_level {} needs {}",
                self.levels.len(),
                self.end_level,
                self.end_level
            )));
        }
        self.analysis
            .validate()
            .map_err(|e| ScenarioError::Invalid(e.to_string()))?;

        for (name, &price) in self.prices.methods.iter().chain(&self.prices.materials) {
            if !price.is_finite() || price < 0.0 {
                return Err(ScenarioError::Invalid(format!(
                    "price of '{name}' must be a non-negative number, got {price}"
                )));
            }
        }
        for (step, level) in self.levels.iter().enumerate() {
            if !level.base_cost.is_finite() || level.base_cost < 0.0 {
                return Err(ScenarioError::Invalid(format!(
                    "level {step}: base_cost must be a non-negative number"
                )));
            }
            for material in level.materials.keys() {
                if !self.prices.materials.contains_key(material) {
                    return Err(ScenarioError::Invalid(format!(
                        "level {step}: no price for material '{material}'"
                    )));
                }
            }
        }
        for assignment in &self.custom_path {
            if assignment.step >= self.end_level {
                return Err(ScenarioError::Invalid(format!(
                    "custom_path step {} is outside 0..{}",
                    assignment.step, self.end_level
                )));
            }
        }
        self.optimizer
            .validate(&self.catalog()?)
            .map_err(|e| ScenarioError::Invalid(e.to_string()))
    }

    /// The scenario's catalog with prices applied.
    pub fn catalog(&self) -> Result<MethodCatalog, ScenarioError> {
        let base = match &self.methods {
            Some(methods) => MethodCatalog::new(methods.clone()),
            None => Ok(reference_catalog()),
        };
        base.and_then(|catalog| catalog.with_prices(&self.prices.methods))
            .map_err(|e| ScenarioError::Invalid(e.to_string()))
    }

    /// Per-step item data with material unit costs resolved from the price book.
    pub fn step_data(&self) -> Vec<StepData> {
        self.levels
            .iter()
            .map(|level| {
                level.materials.iter().fold(
                    StepData::new(level.success_rate).with_base_cost(level.base_cost),
                    |data, (id, &quantity)| {
                        let unit_cost = self.prices.materials.get(id).copied().unwrap_or(0.0);
                        data.with_material(id.as_str(), unit_cost, quantity)
                    },
                )
            })
            .collect()
    }

    /// The custom assignment keyed by step; later entries win.
    pub fn custom_assignments(&self) -> BTreeMap<usize, MethodId> {
        self.custom_path
            .iter()
            .map(|a| (a.step, a.method.clone()))
            .collect()
    }
}
