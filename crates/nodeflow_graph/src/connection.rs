// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::{PortDirection, PortIndex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// One end of a connection, fixed to a node port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Node owning the port
    pub node: NodeId,
    /// Port index on that node
    pub port: PortIndex,
}

/// A directed edge from a producer's output port to a consumer's input port.
///
/// While a connection is being dragged one of its ends is dangling
/// (`None`). Only fully attached connections are registered in node
/// state and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    input: Option<Endpoint>,
    output: Option<Endpoint>,
}

impl Connection {
    /// Create a connection with one end fixed and the other dangling
    pub fn dangling(direction: PortDirection, node: NodeId, port: PortIndex) -> Self {
        let endpoint = Some(Endpoint { node, port });
        let (input, output) = match direction {
            PortDirection::Input => (endpoint, None),
            PortDirection::Output => (None, endpoint),
        };
        Self {
            id: ConnectionId::new(),
            input,
            output,
        }
    }

    /// Create a fully attached connection
    pub fn new(
        node_in: NodeId,
        port_in: PortIndex,
        node_out: NodeId,
        port_out: PortIndex,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            input: Some(Endpoint {
                node: node_in,
                port: port_in,
            }),
            output: Some(Endpoint {
                node: node_out,
                port: port_out,
            }),
        }
    }

    /// Endpoint on the given side, `None` if dangling
    pub fn endpoint(&self, direction: PortDirection) -> Option<Endpoint> {
        match direction {
            PortDirection::Input => self.input,
            PortDirection::Output => self.output,
        }
    }

    /// Consumer end
    pub fn input(&self) -> Option<Endpoint> {
        self.input
    }

    /// Producer end
    pub fn output(&self) -> Option<Endpoint> {
        self.output
    }

    /// Fix the given side to a node port
    pub fn set_endpoint(&mut self, direction: PortDirection, node: NodeId, port: PortIndex) {
        let endpoint = Some(Endpoint { node, port });
        match direction {
            PortDirection::Input => self.input = endpoint,
            PortDirection::Output => self.output = endpoint,
        }
    }

    /// The side still waiting for a port, if any
    pub fn required_direction(&self) -> Option<PortDirection> {
        match (self.input, self.output) {
            (None, _) => Some(PortDirection::Input),
            (_, None) => Some(PortDirection::Output),
            _ => None,
        }
    }

    /// Whether both ends are attached
    pub fn is_complete(&self) -> bool {
        self.input.is_some() && self.output.is_some()
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.input.is_some_and(|e| e.node == node_id) || self.output.is_some_and(|e| e.node == node_id)
    }

    /// Serialized form; dangling connections are not persisted
    pub fn save(&self) -> Option<ConnectionRecord> {
        let (input, output) = (self.input?, self.output?);
        Some(ConnectionRecord {
            in_id: input.node,
            in_index: input.port,
            out_id: output.node,
            out_index: output.port,
        })
    }
}

/// Persisted form of an attached connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Consumer node
    pub in_id: NodeId,
    /// Consumer input port
    pub in_index: PortIndex,
    /// Producer node
    pub out_id: NodeId,
    /// Producer output port
    pub out_index: PortIndex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_connection() {
        let node = NodeId::new();
        let mut connection = Connection::dangling(PortDirection::Output, node, 0);

        assert!(!connection.is_complete());
        assert_eq!(connection.required_direction(), Some(PortDirection::Input));
        assert!(connection.save().is_none());
        assert!(connection.involves_node(node));

        let consumer = NodeId::new();
        connection.set_endpoint(PortDirection::Input, consumer, 1);
        assert!(connection.is_complete());
        assert_eq!(connection.required_direction(), None);
    }

    #[test]
    fn test_record_field_names() {
        let producer = NodeId::new();
        let consumer = NodeId::new();
        let record = Connection::new(consumer, 1, producer, 0).save().unwrap();

        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["in_id"], serde_json::json!(consumer.0.to_string()));
        assert_eq!(json["in_index"], 1);
        assert_eq!(json["out_id"], serde_json::json!(producer.0.to_string()));
        assert_eq!(json["out_index"], 0);
    }
}
