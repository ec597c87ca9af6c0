// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow node graph.
//!
//! Nodes wrap pluggable data models with typed input and output ports;
//! connections carry payloads from an output port to an input port.
//! When a model signals that an output changed, the new value is pushed
//! through every attached connection and the chain continues downstream.
//!
//! ## Architecture
//!
//! - [`Graph`] owns every node and connection; callers hold IDs
//! - [`DataModel`] implementations are created by name from a [`DataModelRegistry`]
//! - Graphs serialize to JSON [`SceneDocument`]s, which also back the undo history
//! - Nodes can be collected into [`Group`]s
//! - Changes are announced to subscribers as [`GraphEvent`]s

pub mod connection;
pub mod document;
pub mod evaluation;
pub mod events;
pub mod geometry;
pub mod graph;
pub mod group;
pub mod history;
pub mod model;
pub mod models;
pub mod node;
pub mod node_state;
pub mod port;
mod propagation;
pub mod settings;

pub use connection::{Connection, ConnectionId, ConnectionRecord, Endpoint};
pub use document::{Anchor, AnchorRecord, SceneDocument, ANCHOR_COUNT};
pub use evaluation::CycleError;
pub use events::{EventBus, GraphEvent, SubscriptionId};
pub use geometry::Point;
pub use graph::{Graph, GraphError};
pub use group::{Group, GroupId, GroupRecord};
pub use history::{History, HistoryStats, HistorySuppression, Snapshot};
pub use model::{DataModel, DataModelRegistry, ModelSignals};
pub use node::{Node, NodeId, NodeRecord};
pub use node_state::{NodeState, ReactToConnectionState};
pub use port::{PortDirection, PortIndex, PortType, PortValue};
pub use settings::{GraphSettings, SettingsError};
