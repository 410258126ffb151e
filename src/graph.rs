//! Graph construction over an edge set.
//!
//! Nodes are segment endpoints rounded to millimetres in the projected plane,
//! so endpoints that agree to three decimals become one node. Each node key
//! is mapped to a small integer index and the graph itself lives in a
//! `petgraph` undirected graph over those indices. Parallel segments between
//! the same pair of nodes coalesce into one graph edge that remembers every
//! contributing segment id.

use geo::Coord;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::projection::Projection;
use crate::types::{planar_length, Segment, SegmentId};

/// Decimal places kept when rounding endpoints into node keys.
pub const NODE_KEY_DECIMALS: i32 = 3;

const NODE_KEY_SCALE: f64 = 1_000.0;

/// Rounded planar coordinate identifying a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    x: i64,
    y: i64,
}

impl NodeKey {
    /// Round a planar coordinate to a key.
    pub fn from_planar(coord: Coord<f64>) -> Self {
        Self {
            x: (coord.x * NODE_KEY_SCALE).round() as i64,
            y: (coord.y * NODE_KEY_SCALE).round() as i64,
        }
    }

    /// The rounded coordinate.
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.x as f64 / NODE_KEY_SCALE,
            y: self.y as f64 / NODE_KEY_SCALE,
        }
    }
}

/// Coalesced edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    /// Shortest contributing length; the shortest-path weight.
    pub weight: f64,
    /// Sum of contributing lengths.
    pub total_length: f64,
    /// Every segment that runs between these two nodes.
    pub segment_ids: BTreeSet<SegmentId>,
}

/// Undirected multigraph view of an edge set.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    graph: UnGraph<NodeKey, NetworkEdge>,
    index: HashMap<NodeKey, NodeIndex>,
    skipped: Vec<SegmentId>,
}

impl NetworkGraph {
    /// Build the graph for `segments`.
    ///
    /// Segments without any coordinate are skipped and recorded in
    /// [`skipped`](Self::skipped). A segment whose ends round to the same key
    /// becomes a self-loop.
    pub fn build(segments: &[Segment], projection: &dyn Projection) -> Self {
        let mut network = Self::default();

        for segment in segments {
            let (Some(start), Some(end)) = (segment.start(), segment.end()) else {
                network.skipped.push(segment.id.clone());
                continue;
            };

            let u = network.node(NodeKey::from_planar(projection.forward(start)));
            let v = network.node(NodeKey::from_planar(projection.forward(end)));

            let length = if segment.length.is_finite() && segment.length >= 0.0 {
                segment.length
            } else {
                planar_length(&projection.forward_line(&segment.geometry))
            };

            match network.graph.find_edge(u, v) {
                Some(e) => {
                    let edge = &mut network.graph[e];
                    edge.weight = edge.weight.min(length);
                    edge.total_length += length;
                    edge.segment_ids.insert(segment.id.clone());
                }
                None => {
                    network.graph.add_edge(
                        u,
                        v,
                        NetworkEdge {
                            weight: length,
                            total_length: length,
                            segment_ids: BTreeSet::from([segment.id.clone()]),
                        },
                    );
                }
            }
        }

        if !network.skipped.is_empty() {
            tracing::debug!(skipped = network.skipped.len(), "segments without geometry skipped");
        }

        network
    }

    fn node(&mut self, key: NodeKey) -> NodeIndex {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(key);
        self.index.insert(key, idx);
        idx
    }

    /// Underlying petgraph graph.
    pub fn graph(&self) -> &UnGraph<NodeKey, NetworkEdge> {
        &self.graph
    }

    /// Number of distinct nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of coalesced edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Segments skipped for lacking geometry.
    pub fn skipped(&self) -> &[SegmentId] {
        &self.skipped
    }

    /// Node index for a planar coordinate, if the graph has that node.
    pub fn node_at(&self, planar: Coord<f64>) -> Option<NodeIndex> {
        self.index.get(&NodeKey::from_planar(planar)).copied()
    }

    /// Number of edge ends at a node; a self-loop counts twice.
    pub fn degree(&self, node: NodeIndex) -> usize {
        self.graph
            .edge_references()
            .map(|e| usize::from(e.source() == node) + usize::from(e.target() == node))
            .sum()
    }

    /// Edge carrying `segment_id`.
    pub fn edge_for_segment(&self, segment_id: &SegmentId) -> Option<EdgeIndex> {
        self.graph
            .edge_indices()
            .find(|&e| self.graph[e].segment_ids.contains(segment_id))
    }

    /// Sum of contributing lengths over all edges, meters.
    pub fn total_length(&self) -> f64 {
        self.graph.edge_weights().map(|e| e.total_length).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::PlanarIdentity;
    use crate::types::FunctionalClass;
    use geo::LineString;

    fn seg(id: &str, coords: Vec<(f64, f64)>) -> Segment {
        let line = LineString::from(coords);
        let length = planar_length(&line);
        Segment::new(id, FunctionalClass::new("footway"), line, length)
    }

    #[test]
    fn test_shared_endpoint_is_one_node() {
        let network = NetworkGraph::build(
            &[
                seg("ab", vec![(0.0, 0.0), (10.0, 0.0)]),
                seg("bc", vec![(10.0004, 0.0), (20.0, 0.0)]),
            ],
            &PlanarIdentity,
        );

        assert_eq!(network.node_count(), 3);
        assert_eq!(network.edge_count(), 2);
        let b = network.node_at(Coord { x: 10.0, y: 0.0 }).unwrap();
        assert_eq!(network.degree(b), 2);
    }

    #[test]
    fn test_parallel_segments_coalesce() {
        let network = NetworkGraph::build(
            &[
                seg("straight", vec![(0.0, 0.0), (10.0, 0.0)]),
                seg("detour", vec![(0.0, 0.0), (5.0, 5.0), (10.0, 0.0)]),
            ],
            &PlanarIdentity,
        );

        assert_eq!(network.edge_count(), 1);
        let edge = network.graph().edge_weights().next().unwrap();
        assert_eq!(edge.segment_ids.len(), 2);
        assert!((edge.weight - 10.0).abs() < 1e-12);
        assert!(edge.total_length > 20.0);
    }

    #[test]
    fn test_empty_geometry_skipped_and_self_loop_kept() {
        let mut empty = seg("empty", vec![]);
        empty.length = 0.0;
        let network = NetworkGraph::build(
            &[
                empty,
                seg("loop", vec![(0.0, 0.0), (5.0, 5.0), (0.0, 0.0)]),
            ],
            &PlanarIdentity,
        );

        assert_eq!(network.skipped(), &[SegmentId::new("empty")]);
        assert_eq!(network.node_count(), 1);
        assert_eq!(network.edge_count(), 1);
        let n = network.node_at(Coord { x: 0.0, y: 0.0 }).unwrap();
        assert_eq!(network.degree(n), 2);
    }

    #[test]
    fn test_non_finite_length_falls_back_to_geometry() {
        let mut s = seg("ab", vec![(0.0, 0.0), (3.0, 4.0)]);
        s.length = f64::NAN;
        let network = NetworkGraph::build(&[s], &PlanarIdentity);
        let edge = network.graph().edge_weights().next().unwrap();
        assert!((edge.weight - 5.0).abs() < 1e-12);
    }
}
