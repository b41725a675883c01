//! Method catalogs — the set of interchangeable upgrade methods a plan can use.
//!
//! The reference catalog mirrors the five consumables of the reference game:
//! four regressing scrolls and one no-regression stone. Prices are not part of
//! the catalog's identity; they arrive per scenario through [`MethodCatalog::with_prices`].

use std::collections::BTreeMap;

use upways_core::{Method, MethodId};

use crate::enumerator::OptimizeError;

/// Identifiers of the reference methods.
pub mod ids {
    pub const BLESSING_SCROLL: &str = "blessing_scroll";
    pub const BLACKSMITH_MANUAL: &str = "blacksmith_manual";
    pub const DRAGON_GOD_SCROLL: &str = "dragon_god_scroll";
    pub const WAR_SCROLL: &str = "war_scroll";
    pub const MAGIC_STONE: &str = "magic_stone";
}

/// Steps covered by the War Scroll's guaranteed table.
pub const WAR_SCROLL_STEPS: usize = 4;

/// Ordered collection of methods. Order matters: it fixes the enumeration
/// order and therefore which of several equal-cost plans wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodCatalog {
    methods: Vec<Method>,
}

impl MethodCatalog {
    /// Rejects duplicate ids.
    pub fn new(methods: Vec<Method>) -> Result<Self, OptimizeError> {
        for (i, m) in methods.iter().enumerate() {
            if methods[..i].iter().any(|other| other.id == m.id) {
                return Err(OptimizeError::DuplicateMethod(m.id.clone()));
            }
        }
        Ok(Self { methods })
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn position(&self, id: &MethodId) -> Option<usize> {
        self.methods.iter().position(|m| &m.id == id)
    }

    pub fn get(&self, id: &MethodId) -> Result<&Method, OptimizeError> {
        self.methods
            .iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| OptimizeError::UnknownMethod(id.clone()))
    }

    /// Overrides the price of every method named in `prices`.
    pub fn with_prices(mut self, prices: &BTreeMap<String, f64>) -> Result<Self, OptimizeError> {
        for (id, &price) in prices {
            let method = self
                .methods
                .iter_mut()
                .find(|m| m.id.as_str() == id)
                .ok_or_else(|| OptimizeError::UnknownMethod(MethodId::new(id.as_str())))?;
            method.price = price;
        }
        Ok(self)
    }
}

/// The five reference methods, unpriced.
pub fn reference_catalog() -> MethodCatalog {
    MethodCatalog {
        methods: vec![
            Method::new(ids::BLESSING_SCROLL, "Blessing Scroll"),
            Method::new(ids::BLACKSMITH_MANUAL, "Blacksmith Manual").with_fixed_rates(vec![
                100.0, 100.0, 100.0, 100.0, 70.0, 60.0, 50.0, 30.0, 20.0,
            ]),
            Method::new(ids::DRAGON_GOD_SCROLL, "Dragon God Scroll").with_fixed_rates(vec![
                100.0, 100.0, 100.0, 100.0, 45.0, 40.0, 35.0, 25.0, 20.0,
            ]),
            Method::new(ids::WAR_SCROLL, "War Scroll")
                .with_fixed_rates(vec![100.0; WAR_SCROLL_STEPS])
                .with_max_step(WAR_SCROLL_STEPS),
            Method::new(ids::MAGIC_STONE, "Magic Stone").with_no_regression(true),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upways_core::StepData;

    #[test]
    fn reference_catalog_shape() {
        let catalog = reference_catalog();
        assert_eq!(catalog.len(), 5);
        let stone = catalog.get(&MethodId::from(ids::MAGIC_STONE)).unwrap();
        assert!(stone.no_regression);
        assert!(stone.fixed_rates.is_none());

        let war = catalog.get(&MethodId::from(ids::WAR_SCROLL)).unwrap();
        assert!(war.is_available_at(3));
        assert!(!war.is_available_at(4));

        let manual = catalog.get(&MethodId::from(ids::BLACKSMITH_MANUAL)).unwrap();
        assert_eq!(manual.rate_at(4, &StepData::new(10.0)), 70.0);
        assert_eq!(manual.rate_at(9, &StepData::new(10.0)), 10.0);
    }

    #[test]
    fn prices_apply_by_id() {
        let prices = BTreeMap::from([(ids::MAGIC_STONE.to_string(), 4.5)]);
        let catalog = reference_catalog().with_prices(&prices).unwrap();
        assert_eq!(catalog.get(&MethodId::from(ids::MAGIC_STONE)).unwrap().price, 4.5);
        assert_eq!(catalog.get(&MethodId::from(ids::WAR_SCROLL)).unwrap().price, 0.0);
    }

    #[test]
    fn unknown_price_key_is_rejected() {
        let prices = BTreeMap::from([("mystery".to_string(), 1.0)]);
        assert!(matches!(
            reference_catalog().with_prices(&prices),
            Err(OptimizeError::UnknownMethod(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = MethodCatalog::new(vec![Method::new("a", "A"), Method::new("a", "Again")]);
        assert!(matches!(err, Err(OptimizeError::DuplicateMethod(_))));
    }
}
