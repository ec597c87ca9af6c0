// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node groups.
//!
//! A group is a named set of nodes that move and select together in a
//! presentation layer. A node belongs to at most one group; grouping it
//! again moves it out of its previous group. Groups that lose their last
//! node are deleted.

use crate::events::GraphEvent;
use crate::graph::{Graph, GraphError};
use crate::node::NodeId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub Uuid);

impl GroupId {
    /// Generate a new random group ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of nodes, kept in the order they were added
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    nodes: IndexSet<NodeId>,
}

impl Group {
    fn new(id: GroupId, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            id,
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Group ID
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Member nodes
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Whether a node is a member
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains(&node_id)
    }

    /// Number of member nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the group has no members
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialized form
    pub fn save(&self) -> GroupRecord {
        GroupRecord {
            id: self.id,
            nodes: self.nodes().collect(),
        }
    }
}

/// Persisted form of a [`Group`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Group ID
    pub id: GroupId,
    /// Member node IDs
    pub nodes: Vec<NodeId>,
}

impl Graph {
    /// Group the given nodes, taking them out of any group they were in.
    ///
    /// Duplicate IDs are collapsed. Fails without changing anything when
    /// the list is empty or names an unknown node.
    pub fn create_group(&mut self, node_ids: &[NodeId]) -> Result<GroupId, GraphError> {
        if node_ids.is_empty() {
            return Err(GraphError::EmptyGroup);
        }
        for &id in node_ids {
            self.existing_node(id)?;
        }
        for &id in node_ids {
            self.drop_from_groups(id);
        }

        let group = Group::new(GroupId::new(), node_ids.iter().copied());
        let id = group.id;
        self.groups.insert(id, group);
        self.events.emit(&GraphEvent::GroupCreated(id));
        Ok(id)
    }

    /// Group the selected nodes
    pub fn create_group_from_selection(&mut self) -> Result<GroupId, GraphError> {
        let selected = self.selected_nodes();
        self.create_group(&selected)
    }

    /// Recreate a saved group under its saved ID.
    ///
    /// Members missing from the graph are skipped; a group left without
    /// members is not created.
    pub fn restore_group(&mut self, record: &GroupRecord) -> Result<Option<GroupId>, GraphError> {
        if self.groups.contains_key(&record.id) {
            return Err(GraphError::DuplicateGroup(record.id));
        }
        let (present, missing): (Vec<NodeId>, Vec<NodeId>) =
            record.nodes.iter().copied().partition(|id| self.nodes.contains_key(id));
        if !missing.is_empty() {
            tracing::warn!("Group {:?} names {} unknown node(s)", record.id, missing.len());
        }
        if present.is_empty() {
            return Ok(None);
        }
        for &id in &present {
            self.drop_from_groups(id);
        }

        self.groups.insert(record.id, Group::new(record.id, present));
        self.events.emit(&GraphEvent::GroupCreated(record.id));
        Ok(Some(record.id))
    }

    /// Dissolve a group; its nodes stay in the graph
    pub fn remove_group(&mut self, group_id: GroupId) -> Result<(), GraphError> {
        if !self.groups.contains_key(&group_id) {
            return Err(GraphError::GroupNotFound(group_id));
        }
        self.remove_group_unchecked(group_id);
        Ok(())
    }

    fn remove_group_unchecked(&mut self, group_id: GroupId) {
        self.events.emit(&GraphEvent::GroupDeleted(group_id));
        self.groups.shift_remove(&group_id);
    }

    /// Take a node out of its group, deleting the group if it empties
    pub(crate) fn drop_from_groups(&mut self, node_id: NodeId) {
        let Some(group_id) = self.group_of(node_id) else {
            return;
        };
        let emptied = self.groups.get_mut(&group_id).is_some_and(|group| {
            group.nodes.shift_remove(&node_id);
            group.is_empty()
        });
        if emptied {
            self.remove_group_unchecked(group_id);
        }
    }

    /// Get a group by ID
    pub fn group(&self, group_id: GroupId) -> Option<&Group> {
        self.groups.get(&group_id)
    }

    /// Get all groups, oldest first
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Get the number of groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The group a node belongs to
    pub fn group_of(&self, node_id: NodeId) -> Option<GroupId> {
        self.groups
            .values()
            .find(|group| group.contains(node_id))
            .map(Group::id)
    }
}
