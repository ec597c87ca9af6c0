// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-node bookkeeping of which connections occupy which port slot.

use crate::connection::ConnectionId;
use crate::port::{PortDirection, PortIndex, PortType};
use indexmap::IndexSet;

/// Connections attached to one port slot, in attach order
pub type PortSlot = IndexSet<ConnectionId>;

/// Whether a node is reacting to a connection being dragged over it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactToConnectionState {
    /// No drag in progress over this node
    #[default]
    NotReacting,
    /// A dangling connection hovers over this node
    Reacting,
}

/// Port occupancy and transient interaction state of a node.
///
/// Slots are indexed by port index; out-of-range indices panic.
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    in_connections: Vec<PortSlot>,
    out_connections: Vec<PortSlot>,
    reaction: ReactToConnectionState,
    reacting_direction: Option<PortDirection>,
    reacting_data_type: Option<PortType>,
    resizing: bool,
}

impl NodeState {
    /// Create state with the given number of input and output slots
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self {
            in_connections: vec![PortSlot::new(); inputs],
            out_connections: vec![PortSlot::new(); outputs],
            ..Self::default()
        }
    }

    /// All slots of one direction
    pub fn entries(&self, direction: PortDirection) -> &[PortSlot] {
        match direction {
            PortDirection::Input => &self.in_connections,
            PortDirection::Output => &self.out_connections,
        }
    }

    fn entries_mut(&mut self, direction: PortDirection) -> &mut Vec<PortSlot> {
        match direction {
            PortDirection::Input => &mut self.in_connections,
            PortDirection::Output => &mut self.out_connections,
        }
    }

    /// Connections occupying a slot
    ///
    /// # Panics
    ///
    /// Panics if `index` is beyond the slot count for `direction`.
    pub fn connections(&self, direction: PortDirection, index: PortIndex) -> &PortSlot {
        &self.entries(direction)[index]
    }

    /// Every connection attached to the node, inputs first
    pub fn all_connections(&self) -> Vec<ConnectionId> {
        self.in_connections
            .iter()
            .chain(self.out_connections.iter())
            .flat_map(|slot| slot.iter().copied())
            .collect()
    }

    /// Register a connection in a slot
    ///
    /// # Panics
    ///
    /// Panics if `index` is beyond the slot count for `direction`.
    pub fn set_connection(&mut self, direction: PortDirection, index: PortIndex, id: ConnectionId) {
        self.entries_mut(direction)[index].insert(id);
    }

    /// Remove a connection from a slot; absent ids are ignored
    pub fn erase_connection(&mut self, direction: PortDirection, index: PortIndex, id: ConnectionId) {
        if let Some(slot) = self.entries_mut(direction).get_mut(index) {
            slot.shift_remove(&id);
        }
    }

    /// Connections sitting at or beyond the given slot counts
    pub fn connections_beyond(&self, inputs: usize, outputs: usize) -> Vec<ConnectionId> {
        let stale_in = self.in_connections.iter().skip(inputs);
        let stale_out = self.out_connections.iter().skip(outputs);
        stale_in
            .chain(stale_out)
            .flat_map(|slot| slot.iter().copied())
            .collect()
    }

    /// Resize the slot arrays, keeping entries at surviving indices.
    ///
    /// Callers delete connections reported by
    /// [`NodeState::connections_beyond`] before shrinking.
    pub fn update_entries(&mut self, inputs: usize, outputs: usize) {
        debug_assert!(
            self.connections_beyond(inputs, outputs).is_empty(),
            "shrinking node state would orphan connections"
        );
        self.in_connections.resize_with(inputs, PortSlot::new);
        self.out_connections.resize_with(outputs, PortSlot::new);
    }

    /// Current drag reaction
    pub fn reaction(&self) -> ReactToConnectionState {
        self.reaction
    }

    /// Direction of the port being dragged, while reacting
    pub fn reacting_direction(&self) -> Option<PortDirection> {
        self.reacting_direction
    }

    /// Payload type of the port being dragged, while reacting
    pub fn reacting_data_type(&self) -> Option<&PortType> {
        self.reacting_data_type.as_ref()
    }

    /// Start reacting to a dragged connection
    pub fn set_reaction(&mut self, direction: PortDirection, data_type: PortType) {
        self.reaction = ReactToConnectionState::Reacting;
        self.reacting_direction = Some(direction);
        self.reacting_data_type = Some(data_type);
    }

    /// Stop reacting
    pub fn reset_reaction(&mut self) {
        self.reaction = ReactToConnectionState::NotReacting;
        self.reacting_direction = None;
        self.reacting_data_type = None;
    }

    /// Whether a drag hovers over the node
    pub fn is_reacting(&self) -> bool {
        self.reaction == ReactToConnectionState::Reacting
    }

    /// Mark an interactive resize in progress
    pub fn set_resizing(&mut self, resizing: bool) {
        self.resizing = resizing;
    }

    /// Whether an interactive resize is in progress
    pub fn resizing(&self) -> bool {
        self.resizing
    }
}
