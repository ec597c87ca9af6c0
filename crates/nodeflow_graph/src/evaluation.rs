// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph traversal and dependency ordering.

use crate::graph::Graph;
use crate::model::DataModel;
use crate::node::{Node, NodeId};
use indexmap::IndexMap;
use std::collections::VecDeque;

impl Graph {
    /// Visit every node in registry order
    pub fn iterate_over_nodes(&self, mut visitor: impl FnMut(&Node)) {
        for node in self.nodes.values() {
            visitor(node);
        }
    }

    /// Visit every node's model in registry order
    pub fn iterate_over_node_data(&self, mut visitor: impl FnMut(&dyn DataModel)) {
        for node in self.nodes.values() {
            visitor(node.model());
        }
    }

    /// Visit every node's model after the models of all its producers.
    ///
    /// A cycle is reported before any model is visited.
    pub fn iterate_over_node_data_dependent_order(
        &self,
        mut visitor: impl FnMut(&dyn DataModel),
    ) -> Result<(), CycleError> {
        for id in self.dependency_order()? {
            if let Some(node) = self.nodes.get(&id) {
                visitor(node.model());
            }
        }
        Ok(())
    }

    /// Node IDs ordered so that every producer precedes its consumers.
    ///
    /// Sources (no connected input) come first in registry order.
    pub fn dependency_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut in_degree: IndexMap<NodeId, usize> = self.nodes.keys().map(|&id| (id, 0)).collect();
        let mut consumers: IndexMap<NodeId, Vec<NodeId>> = IndexMap::new();

        for connection in self.connections.values() {
            let (Some(input), Some(output)) = (connection.input(), connection.output()) else {
                continue;
            };
            if !self.nodes.contains_key(&output.node) {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(&input.node) {
                *degree += 1;
                consumers.entry(output.node).or_default().push(input.node);
            }
        }

        let mut queue: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for consumer in consumers.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(consumer) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*consumer);
                    }
                }
            }
        }

        if order.len() < in_degree.len() {
            let nodes: Vec<NodeId> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id)
                .collect();
            tracing::debug!("Dependency order blocked by {} node(s)", nodes.len());
            return Err(CycleError { nodes });
        }

        Ok(order)
    }
}

/// The graph has a cycle, so no dependency order exists
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Graph contains a cycle through {} node(s)", .nodes.len())]
pub struct CycleError {
    /// Nodes whose inputs never resolved
    pub nodes: Vec<NodeId>,
}
