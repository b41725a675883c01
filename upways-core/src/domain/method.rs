//! Interchangeable upgrade methods.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::step::StepData;

/// Stable identifier of a method within a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(pub String);

impl MethodId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MethodId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An option applicable at a step.
///
/// The rate comes from `fixed_rates[step]` when the table covers the step and
/// from the item's own rate ([`StepData::success_rate`]) otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub id: MethodId,
    pub name: String,
    #[serde(default)]
    pub fixed_rates: Option<Vec<f64>>,
    /// Failure keeps the current level instead of dropping one.
    #[serde(default)]
    pub no_regression: bool,
    /// Price of the consumable, paid once per attempt.
    #[serde(default)]
    pub price: f64,
    /// Exclusive upper bound on the steps this method can be used at.
    #[serde(default)]
    pub max_step: Option<usize>,
}

impl Method {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: MethodId::new(id),
            name: name.into(),
            fixed_rates: None,
            no_regression: false,
            price: 0.0,
            max_step: None,
        }
    }

    pub fn with_fixed_rates(mut self, rates: Vec<f64>) -> Self {
        self.fixed_rates = Some(rates);
        self
    }

    pub fn with_no_regression(mut self, no_regression: bool) -> Self {
        self.no_regression = no_regression;
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_max_step(mut self, max_step: usize) -> Self {
        self.max_step = Some(max_step);
        self
    }

    pub fn is_available_at(&self, step: usize) -> bool {
        self.max_step.map_or(true, |max| step < max)
    }

    pub fn rate_at(&self, step: usize, data: &StepData) -> f64 {
        self.fixed_rates
            .as_ref()
            .and_then(|rates| rates.get(step).copied())
            .unwrap_or(data.success_rate)
    }

    /// Method price plus the step's flat fee and materials.
    pub fn cost_at(&self, data: &StepData) -> f64 {
        self.price + data.base_cost + data.material_cost()
    }
}
