// SPDX-License-Identifier: MIT OR Apache-2.0
//! Notifications emitted by the graph.
//!
//! Presentation layers subscribe closures to keep their own views in
//! sync. Deletion events fire while the entity is still registered, so a
//! subscriber can drop whatever it keeps for that ID.

use crate::connection::ConnectionId;
use crate::geometry::Point;
use crate::group::GroupId;
use crate::node::NodeId;
use indexmap::IndexMap;
use std::fmt;

/// Something that happened to the graph or to one of its entities
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A node was added
    NodeCreated(NodeId),
    /// A node is about to be removed
    NodeDeleted(NodeId),
    /// A connection was added
    ConnectionCreated(ConnectionId),
    /// A connection is about to be removed
    ConnectionDeleted(ConnectionId),
    /// A group was formed
    GroupCreated(GroupId),
    /// A group is about to be dissolved
    GroupDeleted(GroupId),
    /// A node changed position
    NodeMoved {
        /// Moved node
        node: NodeId,
        /// New position
        position: Point,
    },
    /// A move gesture on a node ended
    NodeMoveFinished {
        /// Moved node
        node: NodeId,
        /// Final position
        position: Point,
    },
    /// A node was double-clicked
    NodeDoubleClicked(NodeId),
    /// The pointer entered a node
    NodeHovered {
        /// Hovered node
        node: NodeId,
        /// Pointer position in screen space
        screen_pos: Point,
    },
    /// The pointer left a node
    NodeHoverLeft(NodeId),
    /// The pointer entered a connection
    ConnectionHovered {
        /// Hovered connection
        connection: ConnectionId,
        /// Pointer position in screen space
        screen_pos: Point,
    },
    /// The pointer left a connection
    ConnectionHoverLeft(ConnectionId),
    /// A context menu was requested on a node
    NodeContextMenu {
        /// Target node
        node: NodeId,
        /// Request position in scene space
        position: Point,
    },
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Event subscriber
pub type EventHandler = Box<dyn FnMut(&GraphEvent)>;

/// Synchronous fan-out of graph events to subscribers, in subscription order
#[derive(Default)]
pub struct EventBus {
    handlers: IndexMap<SubscriptionId, EventHandler>,
    next_id: u64,
}

impl EventBus {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    pub fn subscribe(&mut self, handler: impl FnMut(&GraphEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.insert(id, Box::new(handler));
        id
    }

    /// Remove a handler; returns whether it was registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.handlers.shift_remove(&id).is_some()
    }

    /// Deliver an event to every handler
    pub fn emit(&mut self, event: &GraphEvent) {
        for handler in self.handlers.values_mut() {
            handler(event);
        }
    }

    /// Number of handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}
