//! Per-step facts supplied by the item-data collaborator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unit price and consumed quantity of one material at one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialCost {
    pub unit_cost: f64,
    pub quantity: f64,
}

impl MaterialCost {
    pub fn total(&self) -> f64 {
        self.unit_cost * self.quantity
    }
}

/// Everything known about "attempt to advance past level i" independently of
/// the method used.
///
/// `success_rate` is the item's own rate, used by methods with a dynamic rate
/// source. `base_cost` is a flat fee charged on every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    pub success_rate: f64,
    #[serde(default)]
    pub base_cost: f64,
    /// Keyed by material id; `BTreeMap` keeps serialization deterministic.
    #[serde(default)]
    pub materials: BTreeMap<String, MaterialCost>,
}

impl StepData {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate,
            base_cost: 0.0,
            materials: BTreeMap::new(),
        }
    }

    pub fn with_base_cost(mut self, base_cost: f64) -> Self {
        self.base_cost = base_cost;
        self
    }

    pub fn with_material(mut self, id: impl Into<String>, unit_cost: f64, quantity: f64) -> Self {
        self.materials.insert(
            id.into(),
            MaterialCost {
                unit_cost,
                quantity,
            },
        );
        self
    }

    /// Σ unit_cost × quantity over every consumed material.
    pub fn material_cost(&self) -> f64 {
        self.materials.values().map(MaterialCost::total).sum()
    }
}
