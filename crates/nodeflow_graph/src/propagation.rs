// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data flow along connections.
//!
//! Propagation is a synchronous call chain: a model signals an updated
//! output, the graph reads it and hands it to every consumer, whose own
//! signals continue the chain. Nodes currently forwarding data are kept
//! on a chain stack; a node that would re-enter itself stops the chain.

use crate::connection::{Connection, ConnectionId, Endpoint};
use crate::graph::{Graph, GraphError};
use crate::model::{DataModel, ModelSignals};
use crate::node::NodeId;
use crate::port::{PortDirection, PortIndex, PortValue};

type Chain = Vec<NodeId>;

impl Graph {
    /// Push the current value of output `index` through every connection attached to it.
    ///
    /// Does nothing when the port has no connections.
    pub fn on_data_updated(&mut self, node_id: NodeId, index: PortIndex) -> Result<(), GraphError> {
        self.check_port(node_id, PortDirection::Output, index)?;
        self.propagate_output(node_id, index, &mut Chain::new());
        Ok(())
    }

    /// Deliver a payload to the consumer end of a connection
    pub fn propagate_connection(&mut self, connection_id: ConnectionId, data: Option<PortValue>) -> Result<(), GraphError> {
        let connection = self
            .connections
            .get(&connection_id)
            .ok_or(GraphError::ConnectionNotFound(connection_id))?;
        if let Some(input) = connection.input() {
            self.deliver(input, data, &mut Chain::new());
        }
        Ok(())
    }

    /// Typed mutable access to a node's model.
    ///
    /// Whatever the closure signals is applied afterwards: ports are
    /// resynchronized and updated outputs propagated downstream.
    pub fn update_model<M, R>(
        &mut self,
        node_id: NodeId,
        f: impl FnOnce(&mut M, &mut ModelSignals) -> R,
    ) -> Result<R, GraphError>
    where
        M: DataModel,
    {
        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let model = node
            .model_mut()
            .as_any_mut()
            .downcast_mut::<M>()
            .ok_or(GraphError::ModelTypeMismatch {
                node: node_id,
                expected: std::any::type_name::<M>(),
            })?;

        let mut signals = ModelSignals::new();
        let result = f(model, &mut signals);
        self.apply_signals(node_id, signals, &mut Chain::new());
        Ok(result)
    }

    /// Untyped variant of [`Graph::update_model`]
    pub fn with_model_mut<R>(
        &mut self,
        node_id: NodeId,
        f: impl FnOnce(&mut dyn DataModel, &mut ModelSignals) -> R,
    ) -> Result<R, GraphError> {
        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let mut signals = ModelSignals::new();
        let result = f(node.model_mut(), &mut signals);
        self.apply_signals(node_id, signals, &mut Chain::new());
        Ok(result)
    }

    /// Feed the producer's current output into a freshly attached connection
    pub(crate) fn propagate_through(&mut self, connection_id: ConnectionId) {
        let Some(connection) = self.connections.get(&connection_id) else {
            return;
        };
        let (Some(input), Some(output)) = (connection.input(), connection.output()) else {
            return;
        };
        let Some(producer) = self.nodes.get(&output.node) else {
            return;
        };
        if output.port >= producer.port_count(PortDirection::Output) {
            return;
        }
        let data = producer.out_data(output.port);
        self.deliver(input, data, &mut Chain::new());
    }

    /// Clear the consumer input of a connection that no longer exists
    pub(crate) fn propagate_empty(&mut self, connection: &Connection) {
        if let Some(input) = connection.input() {
            self.deliver(input, None, &mut Chain::new());
        }
    }

    fn propagate_output(&mut self, node_id: NodeId, index: PortIndex, chain: &mut Chain) {
        if chain.contains(&node_id) {
            tracing::warn!("Stopped propagation re-entering node {node_id} through a cycle");
            return;
        }
        let Some(node) = self.nodes.get(&node_id) else {
            return;
        };
        if index >= node.state().entries(PortDirection::Output).len() {
            return;
        }
        let targets: Vec<ConnectionId> = node
            .state()
            .connections(PortDirection::Output, index)
            .iter()
            .copied()
            .collect();
        if targets.is_empty() {
            return;
        }

        let data = node.out_data(index);
        chain.push(node_id);
        for connection_id in targets {
            let input = self.connections.get(&connection_id).and_then(Connection::input);
            if let Some(input) = input {
                self.deliver(input, data.clone(), chain);
            }
        }
        chain.pop();
    }

    fn deliver(&mut self, input: Endpoint, data: Option<PortValue>, chain: &mut Chain) {
        let Some(node) = self.nodes.get_mut(&input.node) else {
            return;
        };
        // The port may have been removed by a resize
        if input.port >= node.port_count(PortDirection::Input) {
            return;
        }
        let signals = node.propagate_data(data, input.port);
        self.apply_signals(input.node, signals, chain);
    }

    fn apply_signals(&mut self, node_id: NodeId, signals: ModelSignals, chain: &mut Chain) {
        if signals.has_port_change() {
            self.sync_ports(node_id);
        }
        for &index in signals.updated() {
            self.propagate_output(node_id, index, chain);
        }
    }

    /// Bring a node's port bookkeeping in line with its model.
    ///
    /// Connections on ports that no longer exist are deleted before the
    /// slots are resized, including dangling ones fixed to such a port.
    fn sync_ports(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.get(&node_id) else {
            return;
        };
        let inputs = node.port_count(PortDirection::Input);
        let outputs = node.port_count(PortDirection::Output);
        let mut stale = node.state().connections_beyond(inputs, outputs);
        stale.extend(
            self.connections
                .values()
                .filter(|c| !c.is_complete())
                .filter(|c| {
                    [(PortDirection::Input, inputs), (PortDirection::Output, outputs)]
                        .into_iter()
                        .any(|(direction, count)| {
                            c.endpoint(direction)
                                .is_some_and(|end| end.node == node_id && end.port >= count)
                        })
                })
                .map(|c| c.id),
        );
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.state_mut().set_resizing(true);
        }

        if !stale.is_empty() {
            tracing::debug!("Node {node_id} resized: deleting {} connection(s)", stale.len());
        }
        for connection_id in stale {
            self.delete_connection_unchecked(connection_id);
        }

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.update_entries();
            node.state_mut().set_resizing(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{create_math_registry, NumberDisplayModel, NumberSourceModel, VariadicSumModel};
    use crate::port::PortType;
    use std::any::Any;
    use std::rc::Rc;

    /// Records every payload it receives
    #[derive(Debug, Default)]
    struct RecordingSink {
        received: Vec<Option<PortValue>>,
    }

    impl DataModel for RecordingSink {
        fn name(&self) -> &str {
            "RecordingSink"
        }

        fn port_count(&self, direction: PortDirection) -> usize {
            match direction {
                PortDirection::Input => 1,
                PortDirection::Output => 0,
            }
        }

        fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> PortType {
            PortType::Float
        }

        fn set_in_data(&mut self, data: Option<PortValue>, _index: PortIndex, _signals: &mut ModelSignals) {
            self.received.push(data);
        }

        fn out_data(&self, _index: PortIndex) -> Option<PortValue> {
            None
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn graph() -> Graph {
        Graph::new(Rc::new(create_math_registry()))
    }

    fn received(graph: &Graph, node: NodeId) -> &[Option<PortValue>] {
        &graph.model::<RecordingSink>(node).unwrap().received
    }

    #[test]
    fn test_connect_delivers_current_output() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(42.0)));
        let sink = graph.create_node(Box::new(RecordingSink::default()));

        graph.create_connection(sink, 0, a, 0).unwrap();
        assert_eq!(received(&graph, sink), &[Some(PortValue::Float(42.0))]);
    }

    #[test]
    fn test_update_propagates_once() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(1.0)));
        let sink = graph.create_node(Box::new(RecordingSink::default()));
        graph.create_connection(sink, 0, a, 0).unwrap();

        graph
            .update_model::<NumberSourceModel, _>(a, |model, signals| model.set_number(7.0, signals))
            .unwrap();

        assert_eq!(
            received(&graph, sink),
            &[Some(PortValue::Float(1.0)), Some(PortValue::Float(7.0))]
        );
    }

    #[test]
    fn test_unconnected_output_is_silent() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(1.0)));
        let sink = graph.create_node(Box::new(RecordingSink::default()));

        graph.on_data_updated(a, 0).unwrap();
        graph
            .update_model::<NumberSourceModel, _>(a, |model, signals| model.set_number(2.0, signals))
            .unwrap();
        assert!(received(&graph, sink).is_empty());
    }

    #[test]
    fn test_chain_reaches_downstream() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(6.0)));
        let b = graph.create_node(Box::new(NumberSourceModel::with_value(3.0)));
        let div = graph.create_node_by_name("Division").unwrap();
        let out = graph.create_node(Box::new(NumberDisplayModel::default()));
        graph.create_connection(div, 0, a, 0).unwrap();
        graph.create_connection(div, 1, b, 0).unwrap();
        graph.create_connection(out, 0, div, 0).unwrap();
        assert_eq!(graph.model::<NumberDisplayModel>(out).unwrap().value(), Some(2.0));

        graph
            .update_model::<NumberSourceModel, _>(b, |model, signals| model.set_number(0.0, signals))
            .unwrap();
        assert_eq!(graph.model::<NumberDisplayModel>(out).unwrap().value(), None);
    }

    #[test]
    fn test_fan_out_reaches_every_consumer() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(1.0)));
        let first = graph.create_node(Box::new(RecordingSink::default()));
        let second = graph.create_node(Box::new(RecordingSink::default()));
        graph.create_connection(first, 0, a, 0).unwrap();
        graph.create_connection(second, 0, a, 0).unwrap();

        graph.on_data_updated(a, 0).unwrap();
        assert_eq!(received(&graph, first).len(), 2);
        assert_eq!(received(&graph, second).len(), 2);
    }

    #[test]
    fn test_cycle_stops_instead_of_recursing() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(1.0)));
        let left = graph.create_node(Box::new(VariadicSumModel::default()));
        let right = graph.create_node(Box::new(VariadicSumModel::default()));
        graph.create_connection(left, 0, a, 0).unwrap();
        graph.create_connection(right, 0, left, 0).unwrap();
        graph.create_connection(left, 1, right, 0).unwrap();

        graph.on_data_updated(a, 0).unwrap();
        assert_eq!(graph.connection_count(), 3);
    }

    #[test]
    fn test_shrinking_ports_deletes_stale_connections() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(1.0)));
        let b = graph.create_node(Box::new(NumberSourceModel::with_value(2.0)));
        let sum = graph.create_node(Box::new(VariadicSumModel::default()));
        let out = graph.create_node(Box::new(NumberDisplayModel::default()));
        graph.create_connection(sum, 0, a, 0).unwrap();
        let dropped = graph.create_connection(sum, 1, b, 0).unwrap();
        graph.create_connection(out, 0, sum, 0).unwrap();
        assert_eq!(graph.model::<NumberDisplayModel>(out).unwrap().value(), Some(3.0));

        graph
            .update_model::<VariadicSumModel, _>(sum, |model, signals| model.set_input_count(1, signals))
            .unwrap();

        assert!(graph.connection(dropped).is_none());
        assert!(graph.node(b).unwrap().state().all_connections().is_empty());
        let node = graph.node(sum).unwrap();
        assert_eq!(node.state().entries(PortDirection::Input).len(), 1);
        assert!(!node.state().resizing());
        assert_eq!(graph.model::<NumberDisplayModel>(out).unwrap().value(), Some(1.0));
    }

    #[test]
    fn test_shrinking_ports_drops_dangling_connection() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(1.0)));
        let sum = graph.create_node(Box::new(VariadicSumModel::default()));
        let kept = graph.create_dangling_connection(PortDirection::Input, sum, 0).unwrap();
        let orphaned = graph.create_dangling_connection(PortDirection::Input, sum, 1).unwrap();

        graph
            .update_model::<VariadicSumModel, _>(sum, |model, signals| model.set_input_count(1, signals))
            .unwrap();

        assert!(graph.connection(orphaned).is_none());
        assert!(matches!(
            graph.complete_connection(orphaned, a, 0),
            Err(GraphError::ConnectionNotFound(_))
        ));
        graph.complete_connection(kept, a, 0).unwrap();
        assert!(graph.connection(kept).unwrap().is_complete());
    }

    #[test]
    fn test_growing_ports_adds_slots() {
        let mut graph = graph();
        let sum = graph.create_node(Box::new(VariadicSumModel::default()));
        graph
            .update_model::<VariadicSumModel, _>(sum, |model, signals| model.set_input_count(4, signals))
            .unwrap();

        let a = graph.create_node(Box::new(NumberSourceModel::with_value(5.0)));
        graph.create_connection(sum, 3, a, 0).unwrap();
        assert_eq!(graph.node(sum).unwrap().input_selected().len(), 4);
    }

    #[test]
    fn test_update_model_type_mismatch() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::default()));

        let err = graph
            .update_model::<NumberDisplayModel, _>(a, |_, _| ())
            .unwrap_err();
        assert!(matches!(err, GraphError::ModelTypeMismatch { node, .. } if node == a));
    }

    #[test]
    fn test_propagate_connection_delivers_payload() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(1.0)));
        let sink = graph.create_node(Box::new(RecordingSink::default()));
        let c = graph.create_connection(sink, 0, a, 0).unwrap();

        graph.propagate_connection(c, Some(PortValue::Bool(true))).unwrap();
        assert_eq!(received(&graph, sink).last(), Some(&Some(PortValue::Bool(true))));
    }
}
