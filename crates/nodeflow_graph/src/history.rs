// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history built on full-graph snapshots.
//!
//! Every recorded entry is the complete serialized graph. A cursor
//! counts the entries that belong to the present: entry `cursor - 1` is
//! the current state, entries past the cursor can be redone.

use crate::document::SceneDocument;
use crate::graph::{Graph, GraphError};
use crate::settings::DEFAULT_MAX_HISTORY;
use std::ops::{Deref, DerefMut};
use std::time::{SystemTime, UNIX_EPOCH};

/// One recorded graph state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Serialized graph document
    pub data: Vec<u8>,
    /// Seconds since the Unix epoch when the snapshot was taken
    pub timestamp: u64,
}

impl Snapshot {
    /// Create a snapshot of serialized data
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// History statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Recorded snapshots
    pub entries: usize,
    /// Cursor position
    pub index: usize,
    /// Total bytes held
    pub memory_used: usize,
    /// Maximum number of snapshots
    pub max_depth: usize,
}

/// Snapshot sequence with a cursor and a recording switch
#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<Snapshot>,
    index: usize,
    recording: bool,
    max_depth: usize,
}

impl History {
    /// Create an empty history
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_HISTORY)
    }

    /// Create with custom maximum depth (at least one entry is always kept)
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            index: 0,
            recording: true,
            max_depth: max_depth.max(1),
        }
    }

    /// Drop every snapshot, rewind the cursor and resume recording
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.index = 0;
        self.recording = true;
    }

    /// Whether [`History::record`] currently stores snapshots
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Switch recording, returning the previous setting
    pub(crate) fn set_recording(&mut self, recording: bool) -> bool {
        std::mem::replace(&mut self.recording, recording)
    }

    /// Append a snapshot after the cursor, discarding any redo entries.
    ///
    /// Returns `false` without storing anything while recording is off.
    pub fn record(&mut self, data: Vec<u8>) -> bool {
        if !self.recording {
            return false;
        }

        self.snapshots.truncate(self.index);
        self.snapshots.push(Snapshot::new(data));
        self.index += 1;

        if self.snapshots.len() > self.max_depth {
            let excess = self.snapshots.len() - self.max_depth;
            self.snapshots.drain(..excess);
            self.index -= excess;
        }

        true
    }

    /// Move the cursor back one entry and return the state to reload
    pub fn step_back(&mut self) -> Option<Vec<u8>> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        Some(self.snapshots[self.index - 1].data.clone())
    }

    /// Return the state to reload and move the cursor forward one entry
    pub fn step_forward(&mut self) -> Option<Vec<u8>> {
        if !self.can_redo() {
            return None;
        }
        let data = self.snapshots[self.index].data.clone();
        self.index += 1;
        Some(data)
    }

    /// Put the cursor back where a failed step found it
    pub(crate) fn restore_index(&mut self, index: usize) {
        self.index = index.min(self.snapshots.len());
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.index > 1
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.index < self.snapshots.len()
    }

    /// Cursor position
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshot is recorded
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot describing the current state
    pub fn current(&self) -> Option<&Snapshot> {
        self.index.checked_sub(1).and_then(|i| self.snapshots.get(i))
    }

    /// Maximum number of snapshots
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            entries: self.snapshots.len(),
            index: self.index,
            memory_used: self.snapshots.iter().map(Snapshot::size).sum(),
            max_depth: self.max_depth,
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Record the current graph as the newest history entry.
    ///
    /// Any redo entries are discarded. Returns `false` while recording is
    /// suppressed.
    pub fn update_history(&mut self) -> Result<bool, GraphError> {
        if !self.history.is_recording() {
            return Ok(false);
        }
        let data = self.save_to_memory()?;
        let recorded = self.history.record(data);
        tracing::debug!(
            "Recorded history entry {}/{}",
            self.history.index(),
            self.history.len()
        );
        Ok(recorded)
    }

    /// Return to the previous history entry.
    ///
    /// Returns `false` when there is nothing to undo. If the entry cannot
    /// be reloaded, the graph and the cursor stay where they were.
    pub fn undo(&mut self) -> Result<bool, GraphError> {
        let index = self.history.index();
        let Some(data) = self.history.step_back() else {
            return Ok(false);
        };
        tracing::debug!("Undo to history entry {}", self.history.index());
        self.reload_snapshot(&data, index)?;
        Ok(true)
    }

    /// Move forward to the next history entry.
    ///
    /// Returns `false` when there is nothing to redo. If the entry cannot
    /// be reloaded, the graph and the cursor stay where they were.
    pub fn redo(&mut self) -> Result<bool, GraphError> {
        let index = self.history.index();
        let Some(data) = self.history.step_forward() else {
            return Ok(false);
        };
        tracing::debug!("Redo to history entry {}", self.history.index());
        self.reload_snapshot(&data, index)?;
        Ok(true)
    }

    fn reload_snapshot(&mut self, data: &[u8], previous_index: usize) -> Result<(), GraphError> {
        let result = SceneDocument::from_slice(data)
            .map_err(GraphError::from)
            .and_then(|document| self.suppress_history().replace_with_document(&document));
        if let Err(err) = &result {
            tracing::warn!("History entry failed to reload, staying at entry {previous_index}: {err}");
            self.history.restore_index(previous_index);
        }
        result
    }

    /// Forget every history entry and resume recording
    pub fn reset_history(&mut self) {
        self.history.reset();
    }

    /// Stop recording history until the returned guard is dropped
    pub fn suppress_history(&mut self) -> HistorySuppression<'_> {
        let previous = self.history.set_recording(false);
        HistorySuppression { graph: self, previous }
    }

    /// The undo history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// History cursor
    pub fn history_index(&self) -> usize {
        self.history.index()
    }

    /// Number of recorded history entries
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

/// Scoped suspension of history recording.
///
/// Dereferences to the graph; the previous recording state comes back
/// when the guard is dropped.
#[derive(Debug)]
pub struct HistorySuppression<'a> {
    graph: &'a mut Graph,
    previous: bool,
}

impl Deref for HistorySuppression<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        self.graph
    }
}

impl DerefMut for HistorySuppression<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        self.graph
    }
}

impl Drop for HistorySuppression<'_> {
    fn drop(&mut self) {
        self.graph.history.set_recording(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::model::DataModelRegistry;
    use crate::models::{create_math_registry, NumberDisplayModel, NumberSourceModel};
    use crate::settings::GraphSettings;
    use std::rc::Rc;

    fn filled(states: &[&str]) -> History {
        let mut history = History::new();
        for state in states {
            history.record(state.as_bytes().to_vec());
        }
        history
    }

    #[test]
    fn test_initial_state_cannot_undo() {
        let mut history = filled(&["a"]);
        assert_eq!(history.index(), 1);
        assert!(!history.can_undo());
        assert_eq!(history.step_back(), None);
        assert_eq!(history.step_forward(), None);
    }

    #[test]
    fn test_step_back_and_forward() {
        let mut history = filled(&["a", "b", "c"]);

        assert_eq!(history.step_back(), Some(b"b".to_vec()));
        assert_eq!(history.step_back(), Some(b"a".to_vec()));
        assert_eq!(history.step_back(), None);

        assert_eq!(history.step_forward(), Some(b"b".to_vec()));
        assert_eq!(history.step_forward(), Some(b"c".to_vec()));
        assert_eq!(history.step_forward(), None);
        assert_eq!(history.current().map(|s| s.data.as_slice()), Some(&b"c"[..]));
    }

    #[test]
    fn test_record_truncates_redo() {
        let mut history = filled(&["a", "b", "c"]);
        history.step_back();
        history.record(b"d".to_vec());

        assert_eq!(history.len(), 3);
        assert!(!history.can_redo());
        assert_eq!(history.step_back(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_recording_switch() {
        let mut history = filled(&["a"]);
        assert!(history.set_recording(false));
        assert!(!history.record(b"b".to_vec()));
        assert_eq!(history.len(), 1);

        history.reset();
        assert!(history.is_recording());
        assert!(history.is_empty());
        assert_eq!(history.index(), 0);
    }

    #[test]
    fn test_max_depth_drops_oldest() {
        let mut history = History::with_max_depth(2);
        for state in ["a", "b", "c"] {
            history.record(state.as_bytes().to_vec());
        }

        assert_eq!(history.len(), 2);
        assert_eq!(history.index(), 2);
        assert_eq!(history.step_back(), Some(b"b".to_vec()));
        assert_eq!(history.stats().memory_used, 2);
    }

    // ------------------------------------------------------------------------
    // Graph history
    // ------------------------------------------------------------------------

    fn graph() -> Graph {
        Graph::new(Rc::new(create_math_registry()))
    }

    #[test]
    fn test_new_graph_has_one_entry() {
        let mut graph = graph();
        assert_eq!(graph.history().len(), 1);
        assert_eq!(graph.history_index(), 1);
        assert!(!graph.undo().unwrap());
        assert!(!graph.redo().unwrap());
    }

    #[test]
    fn test_undo_redo_boundaries() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(3.0)));
        graph.update_history().unwrap();
        let b = graph.create_node(Box::new(NumberDisplayModel::default()));
        graph.create_connection(b, 0, a, 0).unwrap();
        graph.update_history().unwrap();

        assert!(graph.undo().unwrap());
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![a]);
        assert!(graph.undo().unwrap());
        assert_eq!(graph.node_count(), 0);
        assert!(!graph.undo().unwrap());
        assert_eq!(graph.history_index(), 1);

        assert!(graph.redo().unwrap());
        assert!(graph.redo().unwrap());
        assert!(!graph.redo().unwrap());
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.model::<NumberDisplayModel>(b).unwrap().value(), Some(3.0));
        assert_eq!(graph.history().len(), 3);
    }

    #[test]
    fn test_undo_then_redo_is_byte_identical() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(1.0)));
        graph.update_history().unwrap();
        graph.set_node_position(a, Point::new(10.0, 20.0)).unwrap();
        graph.finish_node_move(a).unwrap();

        let before = graph.save_to_memory().unwrap();
        assert!(graph.undo().unwrap());
        assert_eq!(graph.node_position(a), Some(Point::default()));
        assert!(graph.redo().unwrap());
        assert_eq!(graph.save_to_memory().unwrap(), before);
    }

    #[test]
    fn test_new_change_truncates_redo_branch() {
        let mut graph = graph();
        graph.create_node(Box::new(NumberSourceModel::default()));
        graph.update_history().unwrap();
        graph.create_node(Box::new(NumberSourceModel::default()));
        graph.update_history().unwrap();

        graph.undo().unwrap();
        graph.create_node(Box::new(NumberDisplayModel::default()));
        graph.update_history().unwrap();

        assert_eq!(graph.history().len(), 3);
        assert_eq!(graph.history_index(), 3);
        assert!(!graph.can_redo());
        assert!(!graph.redo().unwrap());
    }

    #[test]
    fn test_suppression_guard_restores_recording() {
        let mut graph = graph();
        {
            let mut suppressed = graph.suppress_history();
            suppressed.create_node(Box::new(NumberSourceModel::default()));
            assert!(!suppressed.update_history().unwrap());
            {
                let nested = suppressed.suppress_history();
                assert!(!nested.history().is_recording());
            }
            assert!(!suppressed.history().is_recording());
        }
        assert!(graph.history().is_recording());
        assert_eq!(graph.history().len(), 1);
        assert!(graph.update_history().unwrap());
    }

    #[test]
    fn test_undo_does_not_record() {
        let mut graph = graph();
        graph.create_node(Box::new(NumberSourceModel::default()));
        graph.update_history().unwrap();
        graph.undo().unwrap();

        assert_eq!(graph.history().len(), 2);
        assert!(graph.history().is_recording());
    }

    #[test]
    fn test_max_history_from_settings() {
        let settings = GraphSettings {
            max_history: 2,
            ..GraphSettings::default()
        };
        let mut graph = Graph::with_settings(Rc::new(create_math_registry()), settings);
        for _ in 0..3 {
            graph.create_node(Box::new(NumberSourceModel::default()));
            graph.update_history().unwrap();
        }

        assert_eq!(graph.history().len(), 2);
        assert!(graph.undo().unwrap());
        assert!(!graph.undo().unwrap());
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_failed_undo_keeps_graph_and_cursor() {
        let mut graph = graph();
        let a = graph.create_node(Box::new(NumberSourceModel::with_value(1.0)));
        graph.update_history().unwrap();
        let b = graph.create_node(Box::new(NumberDisplayModel::default()));
        graph.create_connection(b, 0, a, 0).unwrap();
        graph.update_history().unwrap();
        let before = graph.save_to_memory().unwrap();

        graph.set_registry(Rc::new(DataModelRegistry::new()));
        assert!(matches!(graph.undo(), Err(GraphError::UnknownModel(_))));
        assert_eq!(graph.history_index(), 3);
        assert_eq!(graph.save_to_memory().unwrap(), before);
        assert_eq!(graph.model::<NumberDisplayModel>(b).unwrap().value(), Some(1.0));
        assert!(graph.history().is_recording());

        graph.set_registry(Rc::new(create_math_registry()));
        assert!(graph.undo().unwrap());
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![a]);
        assert_eq!(graph.history_index(), 2);
    }

    #[test]
    fn test_failed_redo_keeps_graph_and_cursor() {
        let mut graph = graph();
        graph.create_node(Box::new(NumberSourceModel::default()));
        graph.update_history().unwrap();
        graph.undo().unwrap();

        graph.set_registry(Rc::new(DataModelRegistry::new()));
        assert!(graph.redo().is_err());
        assert_eq!(graph.history_index(), 1);
        assert_eq!(graph.node_count(), 0);
        assert!(graph.can_redo());
    }
}
