// SPDX-License-Identifier: MIT OR Apache-2.0
//! The graph registry: owns every node and connection.

use crate::connection::{Connection, ConnectionId, ConnectionRecord};
use crate::document::{Anchor, SceneDocument, ANCHOR_COUNT};
use crate::evaluation::CycleError;
use crate::events::{EventBus, GraphEvent, SubscriptionId};
use crate::geometry::Point;
use crate::group::{Group, GroupId};
use crate::history::History;
use crate::model::{DataModel, DataModelRegistry};
use crate::node::{Node, NodeId, NodeRecord};
use crate::port::{PortDirection, PortIndex};
use crate::settings::GraphSettings;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A node graph: nodes, the connections between their ports, camera
/// bookmarks and the undo history.
///
/// Outside code refers to nodes and connections by ID only; subscribe to
/// [`GraphEvent`]s to learn when an ID stops being valid.
pub struct Graph {
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) connections: IndexMap<ConnectionId, Connection>,
    pub(crate) groups: IndexMap<GroupId, Group>,
    registry: Rc<DataModelRegistry>,
    /// Camera bookmarks, persisted with the graph
    pub anchors: [Anchor; ANCHOR_COUNT],
    pub(crate) history: History,
    pub(crate) events: EventBus,
    settings: GraphSettings,
}

impl Graph {
    /// Create an empty graph with default settings
    pub fn new(registry: Rc<DataModelRegistry>) -> Self {
        Self::with_settings(registry, GraphSettings::default())
    }

    /// Create an empty graph.
    ///
    /// The empty state is recorded as the first history entry.
    pub fn with_settings(registry: Rc<DataModelRegistry>, settings: GraphSettings) -> Self {
        let mut graph = Self {
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            groups: IndexMap::new(),
            registry,
            anchors: [Anchor::default(); ANCHOR_COUNT],
            history: History::with_max_depth(settings.max_history),
            events: EventBus::new(),
            settings,
        };
        graph.reset_history();
        if let Err(err) = graph.update_history() {
            tracing::warn!("Failed to record initial history entry: {err}");
        }
        graph
    }

    /// The model registry used by restore and paste
    pub fn registry(&self) -> &DataModelRegistry {
        &self.registry
    }

    /// Replace the model registry
    pub fn set_registry(&mut self, registry: Rc<DataModelRegistry>) {
        self.registry = registry;
    }

    /// Active settings
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Register an event handler
    pub fn subscribe(&mut self, handler: impl FnMut(&GraphEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    /// Remove an event handler
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Forward an event to subscribers.
    ///
    /// Presentation layers use this for pointer-driven notifications
    /// (hover, double-click, context menu) the graph cannot observe itself.
    pub fn emit(&mut self, event: GraphEvent) {
        self.events.emit(&event);
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Wrap a model in a new node and register it
    pub fn create_node(&mut self, model: Box<dyn DataModel>) -> NodeId {
        self.insert_node(Node::new(model))
    }

    /// Create a node from a registered model name
    pub fn create_node_by_name(&mut self, name: &str) -> Result<NodeId, GraphError> {
        let model = self.instantiate(name)?;
        Ok(self.create_node(model))
    }

    fn instantiate(&self, name: &str) -> Result<Box<dyn DataModel>, GraphError> {
        self.registry
            .create(name)
            .ok_or_else(|| GraphError::UnknownModel(name.to_string()))
    }

    fn model_for_record(&self, record: &NodeRecord) -> Result<Box<dyn DataModel>, GraphError> {
        let name = record.model_name().ok_or(GraphError::MissingModelName(record.id))?;
        self.instantiate(name)
    }

    fn insert_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        self.events.emit(&GraphEvent::NodeCreated(id));
        id
    }

    /// Recreate a saved node under its saved ID
    pub fn restore_node(&mut self, record: &NodeRecord) -> Result<NodeId, GraphError> {
        if self.nodes.contains_key(&record.id) {
            return Err(GraphError::DuplicateNode(record.id));
        }
        let mut node = Node::new(self.model_for_record(record)?);
        node.restore(record);
        Ok(self.insert_node(node))
    }

    /// Duplicate a saved node under a fresh ID.
    ///
    /// The copy keeps its offset from `centroid`, re-anchored at `mouse_pos`,
    /// so pasting several nodes preserves their layout.
    pub fn paste_node(
        &mut self,
        record: &NodeRecord,
        centroid: Point,
        mouse_pos: Point,
    ) -> Result<NodeId, GraphError> {
        let mut node = Node::new(self.model_for_record(record)?);
        node.paste(record, NodeId::new());
        node.position = mouse_pos + (node.position - centroid);
        Ok(self.insert_node(node))
    }

    /// Remove a node after deleting every connection touching it.
    ///
    /// The node also leaves its group.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(GraphError::NodeNotFound(node_id));
        }
        self.remove_node_unchecked(node_id);
        Ok(())
    }

    fn remove_node_unchecked(&mut self, node_id: NodeId) {
        self.events.emit(&GraphEvent::NodeDeleted(node_id));

        let mut touching = self
            .nodes
            .get(&node_id)
            .map(|node| node.state().all_connections())
            .unwrap_or_default();
        // Dangling connections are not registered in node state
        touching.extend(
            self.connections
                .values()
                .filter(|c| !c.is_complete() && c.involves_node(node_id))
                .map(|c| c.id),
        );
        for connection_id in touching {
            self.delete_connection_unchecked(connection_id);
        }
        self.drop_from_groups(node_id);

        self.nodes.shift_remove(&node_id);
    }

    /// Remove every node, and with them every connection and group
    pub fn clear_scene(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.remove_node_unchecked(id);
        }
        let leftovers: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in leftovers {
            self.delete_connection_unchecked(id);
        }
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub(crate) fn existing_node(&self, node_id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Typed access to a node's model
    pub fn model<M: DataModel>(&self, node_id: NodeId) -> Option<&M> {
        self.nodes.get(&node_id)?.model().as_any().downcast_ref::<M>()
    }

    /// Scene position of a node
    pub fn node_position(&self, node_id: NodeId) -> Option<Point> {
        self.nodes.get(&node_id).map(|node| node.position)
    }

    /// Move a node
    pub fn set_node_position(&mut self, node_id: NodeId, position: Point) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        node.position = position;
        self.events.emit(&GraphEvent::NodeMoved { node: node_id, position });
        Ok(())
    }

    /// End a move gesture and record the result in history
    pub fn finish_node_move(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        let position = self.existing_node(node_id)?.position;
        self.events.emit(&GraphEvent::NodeMoveFinished { node: node_id, position });
        self.update_history()?;
        Ok(())
    }

    /// Add or remove a node from the selection
    pub fn set_node_selected(&mut self, node_id: NodeId, selected: bool) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        node.selected = selected;
        Ok(())
    }

    /// Deselect every node
    pub fn clear_selection(&mut self) {
        for node in self.nodes.values_mut() {
            node.selected = false;
        }
    }

    /// IDs of the selected nodes
    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.selected)
            .map(Node::id)
            .collect()
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Ports exist only where both the model and the slot bookkeeping have them
    pub(crate) fn check_port(&self, node_id: NodeId, direction: PortDirection, index: PortIndex) -> Result<(), GraphError> {
        let node = self.existing_node(node_id)?;
        let count = node
            .port_count(direction)
            .min(node.state().entries(direction).len());
        if index >= count {
            return Err(GraphError::PortOutOfRange {
                node: node_id,
                direction,
                index,
                count,
            });
        }
        Ok(())
    }

    /// Start a connection fixed at one port, the other end dangling
    pub fn create_dangling_connection(
        &mut self,
        direction: PortDirection,
        node_id: NodeId,
        port: PortIndex,
    ) -> Result<ConnectionId, GraphError> {
        self.check_port(node_id, direction, port)?;
        let connection = Connection::dangling(direction, node_id, port);
        let id = connection.id;
        self.connections.insert(id, connection);
        self.events.emit(&GraphEvent::ConnectionCreated(id));
        Ok(id)
    }

    /// Connect output `port_out` of `node_out` to input `port_in` of `node_in`.
    ///
    /// The consumer receives the producer's current output right away.
    pub fn create_connection(
        &mut self,
        node_in: NodeId,
        port_in: PortIndex,
        node_out: NodeId,
        port_out: PortIndex,
    ) -> Result<ConnectionId, GraphError> {
        self.check_port(node_in, PortDirection::Input, port_in)?;
        self.check_port(node_out, PortDirection::Output, port_out)?;

        let connection = Connection::new(node_in, port_in, node_out, port_out);
        let id = connection.id;
        self.connections.insert(id, connection);
        self.attach(id, node_in, port_in, node_out, port_out);
        self.events.emit(&GraphEvent::ConnectionCreated(id));
        Ok(id)
    }

    /// Attach the dangling end of a connection to a port.
    ///
    /// Both ends are checked: the fixed one may sit on a port that has
    /// since been removed.
    pub fn complete_connection(
        &mut self,
        connection_id: ConnectionId,
        node_id: NodeId,
        port: PortIndex,
    ) -> Result<(), GraphError> {
        let connection = self
            .connections
            .get(&connection_id)
            .ok_or(GraphError::ConnectionNotFound(connection_id))?;
        let direction = connection
            .required_direction()
            .ok_or(GraphError::ConnectionComplete(connection_id))?;
        if let Some(fixed) = connection.endpoint(direction.opposite()) {
            self.check_port(fixed.node, direction.opposite(), fixed.port)?;
        }
        self.check_port(node_id, direction, port)?;

        let Some(connection) = self.connections.get_mut(&connection_id) else {
            return Err(GraphError::ConnectionNotFound(connection_id));
        };
        connection.set_endpoint(direction, node_id, port);
        if let (Some(input), Some(output)) = (connection.input(), connection.output()) {
            self.attach(connection_id, input.node, input.port, output.node, output.port);
        }
        Ok(())
    }

    fn attach(
        &mut self,
        id: ConnectionId,
        node_in: NodeId,
        port_in: PortIndex,
        node_out: NodeId,
        port_out: PortIndex,
    ) {
        if let Some(node) = self.nodes.get_mut(&node_in) {
            node.state_mut().set_connection(PortDirection::Input, port_in, id);
        }
        if let Some(node) = self.nodes.get_mut(&node_out) {
            node.state_mut().set_connection(PortDirection::Output, port_out, id);
        }
        self.propagate_through(id);
    }

    /// Recreate a saved connection
    pub fn restore_connection(&mut self, record: &ConnectionRecord) -> Result<ConnectionId, GraphError> {
        self.create_connection(record.in_id, record.in_index, record.out_id, record.out_index)
    }

    /// Recreate a saved connection between pasted copies of its nodes
    pub fn paste_connection(
        &mut self,
        record: &ConnectionRecord,
        new_in: NodeId,
        new_out: NodeId,
    ) -> Result<ConnectionId, GraphError> {
        self.create_connection(new_in, record.in_index, new_out, record.out_index)
    }

    /// Delete a connection, severing it from both nodes first
    pub fn delete_connection(&mut self, connection_id: ConnectionId) -> Result<(), GraphError> {
        if !self.connections.contains_key(&connection_id) {
            return Err(GraphError::ConnectionNotFound(connection_id));
        }
        self.delete_connection_unchecked(connection_id);
        Ok(())
    }

    pub(crate) fn delete_connection_unchecked(&mut self, connection_id: ConnectionId) {
        // Self-loops are listed twice by node state
        if !self.connections.contains_key(&connection_id) {
            return;
        }
        self.events.emit(&GraphEvent::ConnectionDeleted(connection_id));
        self.remove_from_nodes(connection_id);
        if let Some(connection) = self.connections.shift_remove(&connection_id) {
            if connection.is_complete() {
                self.propagate_empty(&connection);
            }
        }
    }

    fn remove_from_nodes(&mut self, connection_id: ConnectionId) {
        let Some(connection) = self.connections.get(&connection_id) else {
            return;
        };
        for direction in [PortDirection::Input, PortDirection::Output] {
            if let Some(endpoint) = connection.endpoint(direction) {
                if let Some(node) = self.nodes.get_mut(&endpoint.node) {
                    node.state_mut().erase_connection(direction, endpoint.port, connection_id);
                }
            }
        }
    }

    /// Delete every connection attached to an input port
    pub fn erase_input_at_index(&mut self, node_id: NodeId, port: PortIndex) -> Result<(), GraphError> {
        self.check_port(node_id, PortDirection::Input, port)?;
        let attached: Vec<ConnectionId> = self.existing_node(node_id)?
            .state()
            .connections(PortDirection::Input, port)
            .iter()
            .copied()
            .collect();
        for id in attached {
            self.delete_connection_unchecked(id);
        }
        Ok(())
    }

    /// Whether an output port's payload type is accepted by an input port
    pub fn ports_compatible(
        &self,
        node_out: NodeId,
        port_out: PortIndex,
        node_in: NodeId,
        port_in: PortIndex,
    ) -> Result<bool, GraphError> {
        self.check_port(node_out, PortDirection::Output, port_out)?;
        self.check_port(node_in, PortDirection::Input, port_in)?;
        let produced = self.existing_node(node_out)?.data_type(PortDirection::Output, port_out);
        let accepted = self.existing_node(node_in)?.data_type(PortDirection::Input, port_in);
        Ok(produced.can_connect_to(&accepted))
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Serialize the whole graph
    pub fn save_document(&self) -> SceneDocument {
        SceneDocument {
            nodes: self.nodes.values().map(Node::save).collect(),
            connections: self.connections.values().filter_map(Connection::save).collect(),
            groups: self.groups.values().map(Group::save).collect(),
            anchors: self.anchors.iter().copied().map(Into::into).collect(),
        }
    }

    /// Add the contents of a document to the graph: nodes first, then
    /// connections and groups.
    ///
    /// Stops at the first failing record; whatever was restored before it
    /// stays. [`Graph::replace_with_document`] is all-or-nothing.
    pub fn load_document(&mut self, document: &SceneDocument) -> Result<(), GraphError> {
        for record in &document.nodes {
            self.restore_node(record)?;
        }
        for record in &document.connections {
            self.restore_connection(record)?;
        }
        for record in &document.groups {
            self.restore_group(record)?;
        }

        if document.anchors.len() > ANCHOR_COUNT {
            tracing::warn!(
                "Ignoring {} anchors beyond the first {ANCHOR_COUNT}",
                document.anchors.len() - ANCHOR_COUNT
            );
        }
        for (slot, record) in self.anchors.iter_mut().zip(&document.anchors) {
            *slot = Anchor::from(*record);
        }
        Ok(())
    }

    /// Serialize the whole graph to JSON bytes
    pub fn save_to_memory(&self) -> Result<Vec<u8>, GraphError> {
        Ok(self.save_document().to_vec(self.settings.pretty_json)?)
    }

    /// Add the contents of serialized JSON bytes to the graph
    pub fn load_from_memory(&mut self, data: &[u8]) -> Result<(), GraphError> {
        let document = SceneDocument::from_slice(data)?;
        self.load_document(&document)
    }

    /// Write the graph to a file, appending the configured extension when missing.
    ///
    /// Returns the path written.
    pub fn save_to_file(&self, path: &Path) -> Result<PathBuf, GraphError> {
        let extension = self.settings.file_extension.as_str();
        let has_extension = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        let path = if has_extension || extension.is_empty() {
            path.to_path_buf()
        } else {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(extension);
            PathBuf::from(name)
        };

        std::fs::write(&path, self.save_to_memory()?)?;
        tracing::info!("Saved graph to {}", path.display());
        Ok(path)
    }

    /// Replace the graph with a document's contents.
    ///
    /// The document is loaded into a scratch graph first, so on error the
    /// current contents are untouched. History is not recorded.
    pub fn replace_with_document(&mut self, document: &SceneDocument) -> Result<(), GraphError> {
        let staged = self.stage_document(document)?;
        self.replace_contents(staged);
        Ok(())
    }

    fn stage_document(&self, document: &SceneDocument) -> Result<Graph, GraphError> {
        let mut staged = Graph {
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            groups: IndexMap::new(),
            registry: Rc::clone(&self.registry),
            anchors: [Anchor::default(); ANCHOR_COUNT],
            history: History::with_max_depth(1),
            events: EventBus::new(),
            settings: self.settings.clone(),
        };
        staged.load_document(document)?;
        Ok(staged)
    }

    fn replace_contents(&mut self, staged: Graph) {
        self.clear_scene();
        let Graph {
            nodes,
            connections,
            groups,
            anchors,
            ..
        } = staged;
        self.nodes = nodes;
        self.connections = connections;
        self.groups = groups;
        self.anchors = anchors;

        let created = self
            .nodes
            .keys()
            .map(|&id| GraphEvent::NodeCreated(id))
            .chain(self.connections.keys().map(|&id| GraphEvent::ConnectionCreated(id)))
            .chain(self.groups.keys().map(|&id| GraphEvent::GroupCreated(id)))
            .collect::<Vec<_>>();
        for event in &created {
            self.events.emit(event);
        }
    }

    /// Replace the graph with a file's contents and restart history from it.
    ///
    /// On error the graph and its history are left as they were.
    pub fn load_from_file(&mut self, path: &Path) -> Result<(), GraphError> {
        let data = std::fs::read(path)?;
        let document = SceneDocument::from_slice(&data)?;

        self.replace_with_document(&document)?;
        self.reset_history();
        self.update_history()?;

        tracing::info!(
            "Loaded graph from {}: {} nodes, {} connections",
            path.display(),
            self.nodes.len(),
            self.connections.len()
        );
        Ok(())
    }

    /// Serialize a subset of nodes and the connections among them
    pub fn copy_nodes(&self, node_ids: &[NodeId]) -> SceneDocument {
        let nodes: Vec<NodeRecord> = node_ids
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(Node::save)
            .collect();
        let connections = self
            .connections
            .values()
            .filter_map(Connection::save)
            .filter(|c| node_ids.contains(&c.in_id) && node_ids.contains(&c.out_id))
            .collect();
        SceneDocument {
            nodes,
            connections,
            groups: Vec::new(),
            anchors: Vec::new(),
        }
    }

    /// Paste a copied document around `mouse_pos`, giving every node a fresh ID.
    ///
    /// Returns the new node IDs in document order.
    pub fn paste_document(&mut self, document: &SceneDocument, mouse_pos: Point) -> Result<Vec<NodeId>, GraphError> {
        let Some(centroid) = document.centroid() else {
            return Ok(Vec::new());
        };

        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        let mut pasted = Vec::with_capacity(document.nodes.len());
        for record in &document.nodes {
            let id = self.paste_node(record, centroid, mouse_pos)?;
            mapping.insert(record.id, id);
            pasted.push(id);
        }

        for record in &document.connections {
            if let (Some(&new_in), Some(&new_out)) = (mapping.get(&record.in_id), mapping.get(&record.out_id)) {
                self.paste_connection(record, new_in, new_out)?;
            }
        }
        Ok(pasted)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .field("history", &self.history)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Errors raised by graph operations
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Registry has no model with that name
    #[error("No registered model with name {0}")]
    UnknownModel(String),

    /// Saved node lacks a model name
    #[error("Saved node {0:?} has no model name")]
    MissingModelName(NodeId),

    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Node ID already registered
    #[error("Node already exists: {0:?}")]
    DuplicateNode(NodeId),

    /// Group ID already registered
    #[error("Group already exists: {0:?}")]
    DuplicateGroup(GroupId),

    /// Group not found
    #[error("Group not found: {0:?}")]
    GroupNotFound(GroupId),

    /// Group requested without members
    #[error("A group needs at least one node")]
    EmptyGroup,

    /// Connection not found
    #[error("Connection not found: {0:?}")]
    ConnectionNotFound(ConnectionId),

    /// Connection has no dangling end left
    #[error("Connection already complete: {0:?}")]
    ConnectionComplete(ConnectionId),

    /// Port index beyond the model's port count
    #[error("{direction:?} port {index} out of range on node {node:?} ({count} ports)")]
    PortOutOfRange {
        /// Node addressed
        node: NodeId,
        /// Port direction addressed
        direction: PortDirection,
        /// Requested index
        index: PortIndex,
        /// Ports available
        count: usize,
    },

    /// Typed model access with the wrong type
    #[error("Node {node:?} does not hold a {expected} model")]
    ModelTypeMismatch {
        /// Node addressed
        node: NodeId,
        /// Requested model type
        expected: &'static str,
    },

    /// Traversal found a cycle
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
