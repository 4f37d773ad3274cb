//! Ordered collection of base-learner factories.

use crate::baselearner::BaseLearnerFactory;
use crate::core::error::{CwBoostError, Result};
use crate::core::types::Matrix;
use crate::dataset::NewData;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

/// Factories keyed by their id, in registration order.
///
/// Registration order is the iteration order of the optimizer and therefore
/// decides ties between equally good candidates.
#[derive(Debug, Clone, Default)]
pub struct FactoryRegistry {
    factories: Vec<Arc<dyn BaseLearnerFactory>>,
}

impl FactoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its id.
    pub fn register<F: BaseLearnerFactory + 'static>(&mut self, factory: F) -> Result<()> {
        self.register_shared(Arc::new(factory))
    }

    /// Register an already shared factory.
    pub fn register_shared(&mut self, factory: Arc<dyn BaseLearnerFactory>) -> Result<()> {
        if self.contains(factory.factory_id()) {
            return Err(CwBoostError::DuplicateFactory {
                name: factory.factory_id().to_string(),
            });
        }
        log::debug!("registered base-learner factory '{}'", factory.factory_id());
        self.factories.push(factory);
        Ok(())
    }

    /// Remove and return the factory with id `name`.
    pub fn remove(&mut self, name: &str) -> Result<Arc<dyn BaseLearnerFactory>> {
        let position = self
            .factories
            .iter()
            .position(|f| f.factory_id() == name)
            .ok_or_else(|| CwBoostError::unknown_identifier(format!("factory '{name}'")))?;
        Ok(self.factories.remove(position))
    }

    /// Look up a factory by id.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn BaseLearnerFactory>> {
        self.factories.iter().find(|f| f.factory_id() == name)
    }

    /// Check if a factory with id `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Factories in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn BaseLearnerFactory>> {
        self.factories.iter()
    }

    /// Slice of all factories in registration order.
    pub fn factories(&self) -> &[Arc<dyn BaseLearnerFactory>] {
        &self.factories
    }

    /// Factory ids in registration order.
    pub fn names(&self) -> Vec<String> {
        self.factories
            .iter()
            .map(|f| f.factory_id().to_string())
            .collect()
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Build the basis of every factory for new raw data, keyed by factory id.
    pub fn instantiate_new_data(&self, new_data: &NewData) -> Result<HashMap<String, Matrix>> {
        let mut bases = HashMap::with_capacity(self.factories.len());
        for factory in &self.factories {
            bases.insert(
                factory.factory_id().to_string(),
                factory.instantiate_new_data(new_data)?,
            );
        }
        Ok(bases)
    }

    /// One line per factory: id, data key and basis dimension.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for factory in &self.factories {
            let (rows, cols) = factory.data().dim();
            let _ = writeln!(
                out,
                "{}: data '{}', {} x {} basis",
                factory.factory_id(),
                factory.data_identifier(),
                rows,
                cols
            );
        }
        out
    }
}
