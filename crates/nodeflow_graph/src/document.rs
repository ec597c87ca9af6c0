// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-disk form of a graph.
//!
//! ```json
//! {
//!   "nodes": [{ "id": "...", "model": { "name": "NumberSource", ... }, "position": { "x": 0.0, "y": 0.0 } }],
//!   "connections": [{ "in_id": "...", "in_index": 0, "out_id": "...", "out_index": 0 }],
//!   "groups": [{ "id": "...", "nodes": ["..."] }],
//!   "anchors": [{ "position_x": 0.0, "position_y": 0.0, "scale": 1.0 }]
//! }
//! ```

use crate::connection::ConnectionRecord;
use crate::geometry::Point;
use crate::group::GroupRecord;
use crate::node::NodeRecord;
use serde::{Deserialize, Serialize};

/// Number of camera bookmarks a graph keeps
pub const ANCHOR_COUNT: usize = 10;

/// A camera bookmark: scene position plus zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Bookmarked view center
    pub position: Point,
    /// Bookmarked zoom factor
    pub scale: f64,
}

impl Default for Anchor {
    fn default() -> Self {
        Self {
            position: Point::default(),
            scale: 1.0,
        }
    }
}

/// Persisted form of an [`Anchor`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// View center, horizontal
    pub position_x: f64,
    /// View center, vertical
    pub position_y: f64,
    /// Zoom factor
    pub scale: f64,
}

impl From<Anchor> for AnchorRecord {
    fn from(anchor: Anchor) -> Self {
        Self {
            position_x: anchor.position.x,
            position_y: anchor.position.y,
            scale: anchor.scale,
        }
    }
}

impl From<AnchorRecord> for Anchor {
    fn from(record: AnchorRecord) -> Self {
        Self {
            position: Point::new(record.position_x, record.position_y),
            scale: record.scale,
        }
    }
}

/// A whole serialized graph, or a copied subset of one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Node records, restored first
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Connection records, restored once every node exists
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    /// Node groups, restored after connections
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupRecord>,
    /// Camera bookmarks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<AnchorRecord>,
}

impl SceneDocument {
    /// Parse a document from JSON bytes
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Render the document as JSON bytes
    pub fn to_vec(&self, pretty: bool) -> Result<Vec<u8>, serde_json::Error> {
        if pretty {
            serde_json::to_vec_pretty(self)
        } else {
            serde_json::to_vec(self)
        }
    }

    /// Centroid of the node positions
    pub fn centroid(&self) -> Option<Point> {
        Point::centroid(self.nodes.iter().map(|node| node.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchors_are_optional() {
        let doc = SceneDocument::from_slice(br#"{ "nodes": [], "connections": [] }"#).unwrap();
        assert!(doc.anchors.is_empty());
        assert!(doc.groups.is_empty());

        let text = String::from_utf8(doc.to_vec(false).unwrap()).unwrap();
        assert_eq!(text, r#"{"nodes":[],"connections":[]}"#);
    }

    #[test]
    fn test_anchor_record_fields() {
        let anchor = Anchor {
            position: Point::new(1.5, -3.0),
            scale: 2.0,
        };
        let json = serde_json::to_value(AnchorRecord::from(anchor)).unwrap();
        assert_eq!(json, serde_json::json!({ "position_x": 1.5, "position_y": -3.0, "scale": 2.0 }));
        assert_eq!(Anchor::from(AnchorRecord::from(anchor)), anchor);
    }

    #[test]
    fn test_node_record_shape() {
        let doc = SceneDocument::from_slice(
            br#"{
                "nodes": [{
                    "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                    "model": { "name": "NumberSource", "number": 2.0 },
                    "position": { "x": 10.0, "y": 20.0 }
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].model_name(), Some("NumberSource"));
        assert_eq!(doc.centroid(), Some(Point::new(10.0, 20.0)));
        assert!(doc.connections.is_empty());
    }
}
