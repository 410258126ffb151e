//! Approximate centrality over a network graph.
//!
//! Betweenness is estimated from a seeded node sample: shortest paths are
//! only counted between sampled source/target pairs, which bounds the work by
//! the sample size instead of the node count. Closeness is exact.
//!
//! ## Determinism
//!
//! - Node indices follow segment order, so the same edge set yields the same
//!   graph.
//! - The sample comes from a `StdRng` seeded explicitly per call; nothing
//!   touches a thread-local or global generator.
//! - Ties in the Dijkstra frontier break on node index.

use petgraph::algo::dijkstra;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::graph::{NetworkGraph, NodeKey};
use crate::types::SegmentId;

/// Default number of sampled nodes.
pub const DEFAULT_SAMPLE_SIZE: usize = 60;

/// Default sampling seed.
pub const DEFAULT_SEED: u64 = 42;

/// Relative tolerance for treating two path lengths as equal.
const PATH_EPSILON: f64 = 1e-9;

/// Sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentralityParams {
    /// Number of nodes used as sources/targets for betweenness.
    pub sample_size: usize,
    /// Seed for the node sample.
    pub seed: u64,
}

impl Default for CentralityParams {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}

/// Centrality values attributed to one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CentralityRecord {
    /// Sampled edge betweenness, in [0, 1].
    pub betweenness: f64,
    /// Mean closeness of the edge's two nodes, >= 0.
    pub closeness: f64,
}

/// Output of one estimation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentralityResult {
    /// Per-segment values.
    pub records: BTreeMap<SegmentId, CentralityRecord>,
    /// Nodes used as the betweenness sample, sorted.
    pub sampled_nodes: Vec<NodeKey>,
}

impl CentralityResult {
    /// Values for a segment.
    pub fn get(&self, id: &SegmentId) -> Option<&CentralityRecord> {
        self.records.get(id)
    }

    /// Number of segments with values.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no segment has values.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Estimate betweenness and closeness for every segment in `network`.
pub fn estimate(network: &NetworkGraph, params: &CentralityParams) -> CentralityResult {
    let graph = network.graph();
    if graph.edge_count() == 0 {
        return CentralityResult::default();
    }

    let sample = sample_nodes(graph.node_count(), params.sample_size, params.seed);
    let betweenness = subset_edge_betweenness(network, &sample);
    let closeness = node_closeness(network);

    let mut records = BTreeMap::new();
    for edge in graph.edge_references() {
        let record = CentralityRecord {
            betweenness: betweenness[edge.id().index()],
            closeness: (closeness[edge.source().index()] + closeness[edge.target().index()]) / 2.0,
        };
        for id in &edge.weight().segment_ids {
            records.insert(id.clone(), record);
        }
    }

    let mut sampled_nodes: Vec<NodeKey> = sample.iter().map(|&n| graph[n]).collect();
    sampled_nodes.sort();

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        sampled = sampled_nodes.len(),
        seed = params.seed,
        "centrality estimated"
    );

    CentralityResult {
        records,
        sampled_nodes,
    }
}

/// Pick `k` of `n` node indices uniformly without replacement.
///
/// All nodes when `n <= k`. The result is sorted.
pub fn sample_nodes(n: usize, k: usize, seed: u64) -> Vec<NodeIndex> {
    let mut picked: Vec<usize> = if n <= k {
        (0..n).collect()
    } else {
        let mut rng = StdRng::seed_from_u64(seed);
        rand::seq::index::sample(&mut rng, n, k).into_vec()
    };
    picked.sort_unstable();
    picked.into_iter().map(NodeIndex::new).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    dist: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap.
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn same_length(a: f64, b: f64) -> bool {
    (a - b).abs() <= PATH_EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Length-weighted Brandes accumulation restricted to `sample` x `sample`.
///
/// Each unordered sampled pair adds the fraction of its shortest paths that
/// use an edge, so dividing by the number of pairs keeps every value in
/// [0, 1]. Indexed by edge index.
fn subset_edge_betweenness(network: &NetworkGraph, sample: &[NodeIndex]) -> Vec<f64> {
    let graph = network.graph();
    let n = graph.node_count();
    let mut scores = vec![0.0; graph.edge_count()];

    let k = sample.len();
    if k < 2 {
        return scores;
    }

    let mut is_target = vec![false; n];
    for &t in sample {
        is_target[t.index()] = true;
    }

    for &source in sample {
        let s = source.index();
        let mut dist = vec![f64::INFINITY; n];
        let mut sigma = vec![0.0f64; n];
        let mut settled = vec![false; n];
        let mut preds: Vec<Vec<(usize, EdgeIndex)>> = vec![Vec::new(); n];
        let mut order: Vec<usize> = Vec::new();
        let mut heap = BinaryHeap::new();

        dist[s] = 0.0;
        sigma[s] = 1.0;
        heap.push(Frontier { dist: 0.0, node: s });

        while let Some(Frontier { dist: d, node: v }) = heap.pop() {
            if settled[v] || d > dist[v] {
                continue;
            }
            settled[v] = true;
            order.push(v);

            for edge in graph.edges(NodeIndex::new(v)) {
                let w = if edge.source().index() == v {
                    edge.target().index()
                } else {
                    edge.source().index()
                };
                if w == v || settled[w] {
                    continue;
                }

                let alt = d + edge.weight().weight;
                if dist[w].is_infinite() || (alt < dist[w] && !same_length(alt, dist[w])) {
                    dist[w] = alt;
                    sigma[w] = sigma[v];
                    preds[w].clear();
                    preds[w].push((v, edge.id()));
                    heap.push(Frontier { dist: alt, node: w });
                } else if same_length(alt, dist[w]) {
                    sigma[w] += sigma[v];
                    preds[w].push((v, edge.id()));
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = order.pop() {
            if sigma[w] == 0.0 {
                continue;
            }
            let own = if is_target[w] && w != s { 1.0 } else { 0.0 };
            let coeff = (own + delta[w]) / sigma[w];
            for &(v, e) in &preds[w] {
                let credit = sigma[v] * coeff;
                scores[e.index()] += credit;
                delta[v] += credit;
            }
        }
    }

    // Every unordered pair was counted once from each end.
    let pairs = (k * (k - 1)) as f64;
    for score in &mut scores {
        *score = (*score / pairs).clamp(0.0, 1.0);
    }
    scores
}

/// Distance-weighted closeness for every node, indexed by node index.
///
/// Uses the reachable-set correction, so nodes in small components are not
/// inflated: `((r - 1) / total) * ((r - 1) / (n - 1))` where `r` counts the
/// node itself and everything it can reach.
fn node_closeness(network: &NetworkGraph) -> Vec<f64> {
    let graph = network.graph();
    let n = graph.node_count();
    if n < 2 {
        return vec![0.0; n];
    }

    graph
        .node_indices()
        .map(|u| {
            let lengths = dijkstra(graph, u, None, |e| e.weight().weight);
            let reachable = lengths.len() as f64;
            let total: f64 = lengths.values().sum();
            if reachable <= 1.0 || total <= 0.0 {
                0.0
            } else {
                ((reachable - 1.0) / total) * ((reachable - 1.0) / (n as f64 - 1.0))
            }
        })
        .collect()
}
