// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data models: the per-node payload processors, and the registry that
//! maps a model's type name to a factory.

use crate::port::{PortDirection, PortIndex, PortType, PortValue};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;

/// Signals a model raises while handling a call.
///
/// The graph drains them after the call returns: every output index
/// listed in `updated` is pushed through its connections, and a
/// `ports_changed` flag resynchronises the node's port bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSignals {
    updated: Vec<PortIndex>,
    ports_changed: bool,
}

impl ModelSignals {
    /// Create an empty signal set
    pub fn new() -> Self {
        Self::default()
    }

    /// The value at output port `index` changed
    pub fn data_updated(&mut self, index: PortIndex) {
        if !self.updated.contains(&index) {
            self.updated.push(index);
        }
    }

    /// The model's port counts changed
    pub fn ports_changed(&mut self) {
        self.ports_changed = true;
    }

    /// Output ports reported as updated, in report order
    pub fn updated(&self) -> &[PortIndex] {
        &self.updated
    }

    /// Whether port counts changed
    pub fn has_port_change(&self) -> bool {
        self.ports_changed
    }

    /// Whether nothing was signalled
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && !self.ports_changed
    }
}

/// A node's payload processor.
///
/// Models report their ports, accept input payloads, expose output
/// payloads and persist their own configuration. They never see the
/// graph; output changes are reported through [`ModelSignals`].
pub trait DataModel: fmt::Debug + 'static {
    /// Registry name, written to the `"name"` field of the saved model
    fn name(&self) -> &str;

    /// Human readable caption
    fn caption(&self) -> &str {
        self.name()
    }

    /// Number of ports in the given direction
    fn port_count(&self, direction: PortDirection) -> usize;

    /// Payload type of a port
    fn data_type(&self, direction: PortDirection, index: PortIndex) -> PortType;

    /// Receive a payload on input port `index`; `None` clears the input
    fn set_in_data(&mut self, data: Option<PortValue>, index: PortIndex, signals: &mut ModelSignals);

    /// Current value of output port `index`
    fn out_data(&self, index: PortIndex) -> Option<PortValue>;

    /// Model-specific fields to persist (the `"name"` field is added by the node)
    fn save(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Restore model-specific fields written by [`DataModel::save`]
    fn restore(&mut self, _state: &Map<String, Value>) {}

    /// Upcast for typed access
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed mutable access
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Factory producing a fresh model instance
pub type ModelFactory = Box<dyn Fn() -> Box<dyn DataModel>>;

struct RegisteredModel {
    category: String,
    factory: ModelFactory,
}

/// Registry of available data models by name
#[derive(Default)]
pub struct DataModelRegistry {
    models: IndexMap<String, RegisteredModel>,
}

impl DataModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a default-constructible model under its own name
    pub fn register<M>(&mut self, category: impl Into<String>)
    where
        M: DataModel + Default,
    {
        let name = M::default().name().to_string();
        self.register_with(name, category, || Box::new(M::default()));
    }

    /// Register a factory under an explicit name, replacing any previous entry
    pub fn register_with<F>(&mut self, name: impl Into<String>, category: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn DataModel> + 'static,
    {
        self.models.insert(
            name.into(),
            RegisteredModel {
                category: category.into(),
                factory: Box::new(factory),
            },
        );
    }

    /// Create a model by name
    pub fn create(&self, name: &str) -> Option<Box<dyn DataModel>> {
        self.models.get(name).map(|entry| (entry.factory)())
    }

    /// Whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Category of a registered name
    pub fn category(&self, name: &str) -> Option<&str> {
        self.models.get(name).map(|entry| entry.category.as_str())
    }

    /// Distinct categories in registration order
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for entry in self.models.values() {
            if !categories.contains(&entry.category.as_str()) {
                categories.push(&entry.category);
            }
        }
        categories
    }

    /// Names registered under a category
    pub fn names_in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.models
            .iter()
            .filter(move |(_, entry)| entry.category == category)
            .map(|(name, _)| name.as_str())
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for DataModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.models.iter().map(|(name, entry)| (name, &entry.category)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BinaryOp, NumberSourceModel, OperatorModel};

    #[test]
    fn test_registry_create() {
        let mut registry = DataModelRegistry::new();
        registry.register::<NumberSourceModel>("Sources");
        registry.register_with("Addition", "Operators", || Box::new(OperatorModel::new(BinaryOp::Add)));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("NumberSource"));
        let model = registry.create("Addition").unwrap();
        assert_eq!(model.port_count(PortDirection::Input), 2);
        assert!(registry.create("Missing").is_none());
    }

    #[test]
    fn test_registry_categories() {
        let mut registry = DataModelRegistry::new();
        registry.register::<NumberSourceModel>("Sources");
        registry.register::<OperatorModel>("Operators");
        registry.register_with("Alias", "Sources", || Box::new(NumberSourceModel::default()));

        assert_eq!(registry.categories(), vec!["Sources", "Operators"]);
        let sources: Vec<_> = registry.names_in_category("Sources").collect();
        assert_eq!(sources, vec!["NumberSource", "Alias"]);
        assert_eq!(registry.category("Addition"), Some("Operators"));
    }

    #[test]
    fn test_signals_dedup() {
        let mut signals = ModelSignals::new();
        assert!(signals.is_empty());
        signals.data_updated(0);
        signals.data_updated(0);
        signals.data_updated(1);
        assert_eq!(signals.updated(), &[0, 1]);
        assert!(!signals.has_port_change());
        signals.ports_changed();
        assert!(signals.has_port_change());
    }
}
