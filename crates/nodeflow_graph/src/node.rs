// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::geometry::Point;
use crate::model::{DataModel, ModelSignals};
use crate::node_state::NodeState;
use crate::port::{PortDirection, PortIndex, PortType, PortValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Key under which a saved model records its registry name
pub const MODEL_NAME_KEY: &str = "name";

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Persisted form of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID
    pub id: NodeId,
    /// Saved model, including its `"name"`
    pub model: Map<String, Value>,
    /// Scene position
    pub position: Point,
}

impl NodeRecord {
    /// Registry name of the saved model
    pub fn model_name(&self) -> Option<&str> {
        self.model.get(MODEL_NAME_KEY).and_then(Value::as_str)
    }
}

/// A node instance in the graph: one data model plus position and port state
pub struct Node {
    id: NodeId,
    model: Box<dyn DataModel>,
    state: NodeState,
    /// Position in the scene
    pub position: Point,
    input_selected: Vec<bool>,
    /// Whether the node is part of the current selection
    pub selected: bool,
    /// Number of input connections the node expects (used by validators)
    pub target_input_connections: usize,
    /// Number of input connections currently counted by validators
    pub current_input_connections: usize,
}

impl Node {
    /// Wrap a model in a node with a fresh ID
    pub fn new(model: Box<dyn DataModel>) -> Self {
        let inputs = model.port_count(PortDirection::Input);
        let outputs = model.port_count(PortDirection::Output);
        Self {
            id: NodeId::new(),
            model,
            state: NodeState::new(inputs, outputs),
            position: Point::default(),
            input_selected: vec![false; inputs],
            selected: false,
            target_input_connections: 0,
            current_input_connections: 0,
        }
    }

    /// Set the position
    pub fn with_position(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    /// Node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The owned data model
    pub fn model(&self) -> &dyn DataModel {
        self.model.as_ref()
    }

    pub(crate) fn model_mut(&mut self) -> &mut dyn DataModel {
        self.model.as_mut()
    }

    /// Port occupancy state
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    /// Number of model ports in a direction
    pub fn port_count(&self, direction: PortDirection) -> usize {
        self.model.port_count(direction)
    }

    /// Payload type of a model port
    pub fn data_type(&self, direction: PortDirection, index: PortIndex) -> PortType {
        self.model.data_type(direction, index)
    }

    /// Deliver a payload (or `None` to clear) to input port `index`.
    ///
    /// Returns what the model signalled while handling it.
    pub fn propagate_data(&mut self, data: Option<PortValue>, index: PortIndex) -> ModelSignals {
        debug_assert!(index < self.port_count(PortDirection::Input));
        let mut signals = ModelSignals::new();
        self.model.set_in_data(data, index, &mut signals);
        signals
    }

    /// Current value of output port `index`
    pub fn out_data(&self, index: PortIndex) -> Option<PortValue> {
        self.model.out_data(index)
    }

    /// Resize port bookkeeping to the model's current port counts.
    ///
    /// Connections beyond the new bounds must already be gone.
    pub(crate) fn update_entries(&mut self) {
        let inputs = self.model.port_count(PortDirection::Input);
        let outputs = self.model.port_count(PortDirection::Output);
        self.state.update_entries(inputs, outputs);
        self.input_selected.resize(inputs, false);
    }

    /// Per-input selection flags
    pub fn input_selected(&self) -> &[bool] {
        &self.input_selected
    }

    /// Flag an input port as selected
    ///
    /// # Panics
    ///
    /// Panics if `index` is not an input port.
    pub fn set_input_selected(&mut self, index: PortIndex, selected: bool) {
        self.input_selected[index] = selected;
    }

    /// Start reacting to a dragged connection of the given direction and type
    pub fn react_to_possible_connection(&mut self, direction: PortDirection, data_type: PortType) {
        self.state.set_reaction(direction, data_type);
    }

    /// Stop reacting to a dragged connection
    pub fn reset_reaction_to_connection(&mut self) {
        self.state.reset_reaction();
    }

    /// Serialize the node
    pub fn save(&self) -> NodeRecord {
        self.copy_with_new_id(self.id)
    }

    /// Serialize the node under another ID
    pub fn copy_with_new_id(&self, id: NodeId) -> NodeRecord {
        let mut model = self.model.save();
        model.insert(MODEL_NAME_KEY.to_string(), Value::String(self.model.name().to_string()));
        NodeRecord {
            id,
            model,
            position: self.position,
        }
    }

    /// Restore ID, position and model state from a record
    pub fn restore(&mut self, record: &NodeRecord) {
        self.paste(record, record.id);
    }

    /// Restore position and model state from a record under a new ID
    pub fn paste(&mut self, record: &NodeRecord, id: NodeId) {
        self.id = id;
        self.position = record.position;
        self.model.restore(&record.model);
        self.update_entries();
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("model", &self.model.name())
            .field("position", &self.position)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NumberSourceModel, VariadicSumModel};

    #[test]
    fn test_save_includes_model_name() {
        let node = Node::new(Box::new(NumberSourceModel::with_value(4.5)))
            .with_position(Point::new(10.0, -2.0));
        let record = node.save();

        assert_eq!(record.id, node.id());
        assert_eq!(record.model_name(), Some("NumberSource"));
        assert_eq!(record.model["number"], serde_json::json!(4.5));
        assert_eq!(record.position, Point::new(10.0, -2.0));
    }

    #[test]
    fn test_restore_and_paste() {
        let original = Node::new(Box::new(NumberSourceModel::with_value(7.0)))
            .with_position(Point::new(3.0, 4.0));
        let record = original.save();

        let mut restored = Node::new(Box::new(NumberSourceModel::default()));
        restored.restore(&record);
        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.out_data(0), Some(PortValue::Float(7.0)));

        let fresh = NodeId::new();
        let mut pasted = Node::new(Box::new(NumberSourceModel::default()));
        pasted.paste(&record, fresh);
        assert_eq!(pasted.id(), fresh);
        assert_eq!(pasted.position, Point::new(3.0, 4.0));
    }

    #[test]
    fn test_restore_resizes_entries() {
        let mut source = VariadicSumModel::default();
        source.set_input_count(4, &mut ModelSignals::new());
        let record = Node::new(Box::new(source)).save();

        let mut node = Node::new(Box::new(VariadicSumModel::default()));
        node.restore(&record);
        assert_eq!(node.state().entries(PortDirection::Input).len(), 4);
        assert_eq!(node.input_selected().len(), 4);
    }

    #[test]
    fn test_input_selection_and_reaction() {
        let mut node = Node::new(Box::new(VariadicSumModel::default()));
        node.set_input_selected(1, true);
        assert_eq!(node.input_selected(), &[false, true]);

        node.react_to_possible_connection(PortDirection::Output, PortType::Float);
        assert!(node.state().is_reacting());
        node.reset_reaction_to_connection();
        assert!(!node.state().is_reacting());
    }
}
