//! Domain types: per-step inputs, upgrade methods and strategies.

pub mod method;
pub mod step;
pub mod strategy;

pub use method::{Method, MethodId};
pub use step::{MaterialCost, StepData};
pub use strategy::{Step, Strategy};
