//! The sample graph: an undirected, multi-metric graph over sample ids.
//!
//! Storage is an arena: a sorted node list plus a sorted edge list, each
//! edge holding its canonical key and weight record. Nothing mutates a
//! `Graph` after construction; filtering builds a new one from index
//! sets (see `crate::filter`).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::edge::{Edge, EdgeKey, EdgeWeights, NodeId};
use super::matrix::DistanceMatrix;
use crate::{Error, Result};

const HASH_DOMAIN: &[u8] = b"biograph.graph.v1";

/// Undirected graph with per-metric edge weights and a content hash.
///
/// Equality is content-hash equality, so graphs holding NaN weights still
/// compare equal to their copies.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<NodeId>,
    edges: Vec<Edge>,
    content_hash: String,
}

/// Persisted form. The stored hash is re-derived and checked on load.
#[derive(Serialize, Deserialize)]
struct GraphRecord {
    content_hash: String,
    nodes: Vec<NodeId>,
    edges: Vec<Edge>,
}

impl Graph {
    /// The graph with no nodes.
    pub fn empty() -> Self {
        Self::from_parts(Vec::<NodeId>::new(), Vec::new())
    }

    /// Merge distance matrices into one graph.
    ///
    /// Nodes are the union of all labels. Every upper-triangle cell of
    /// every matrix becomes a weight on the edge for its canonical pair,
    /// keyed by the matrix's metric id. Deterministic for a given input
    /// order; if two matrices share a metric id the later one wins.
    pub fn build(matrices: &[DistanceMatrix]) -> Self {
        let mut nodes = BTreeSet::new();
        let mut accumulated: BTreeMap<EdgeKey, EdgeWeights> = BTreeMap::new();

        for matrix in matrices {
            nodes.extend(matrix.labels().iter().cloned());
            let mut overwritten = 0usize;
            for (key, value) in matrix.pairs() {
                if accumulated.entry(key).or_default().insert(matrix.metric_id(), value).is_some() {
                    overwritten += 1;
                }
            }
            if overwritten > 0 {
                warn!(
                    metric = matrix.metric_id(),
                    overwritten,
                    "metric id supplied by more than one matrix; later values win"
                );
            }
        }

        let graph = Self::from_parts(nodes, accumulated);
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            metrics = matrices.len(),
            hash = %graph.content_hash,
            "built sample graph"
        );
        graph
    }

    /// Assemble a graph from nodes and edges. Edge endpoints missing from
    /// `nodes` are added; repeated keys have their weights merged.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = NodeId>,
        edges: impl IntoIterator<Item = (EdgeKey, EdgeWeights)>,
    ) -> Self {
        let mut node_set: BTreeSet<NodeId> = nodes.into_iter().collect();
        let mut edge_map: BTreeMap<EdgeKey, EdgeWeights> = BTreeMap::new();
        for (key, weights) in edges {
            node_set.insert(key.a().to_string());
            node_set.insert(key.b().to_string());
            let slot = edge_map.entry(key).or_default();
            for (metric, value) in weights.iter() {
                slot.insert(metric, value);
            }
        }

        let nodes: Vec<NodeId> = node_set.into_iter().collect();
        let edges: Vec<Edge> = edge_map
            .into_iter()
            .map(|(key, weights)| Edge { key, weights })
            .collect();
        let content_hash = content_digest(&nodes, &edges);

        let graph = Self { nodes, edges, content_hash };
        graph.debug_check_invariants();
        graph
    }

    /// Hex SHA-256 over nodes, edges and weights. Changes exactly when
    /// the structure or a weight changes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Sorted node ids.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Edges sorted by canonical key.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index(id).is_some()
    }

    fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.binary_search_by(|n| n.as_str().cmp(id)).ok()
    }

    /// Weights of the edge between `x` and `y`, in either order.
    pub fn edge(&self, x: &str, y: &str) -> Option<&EdgeWeights> {
        let key = EdgeKey::new(x, y);
        self.edges
            .binary_search_by(|e| e.key.cmp(&key))
            .ok()
            .map(|i| &self.edges[i].weights)
    }

    /// Every metric id carried by at least one edge.
    pub fn metrics(&self) -> BTreeSet<&str> {
        self.edges.iter().flat_map(|e| e.weights.metrics()).collect()
    }

    /// `(min, max)` of a metric's non-NaN weights.
    pub fn metric_range(&self, metric: &str) -> Option<(f64, f64)> {
        self.edges
            .iter()
            .filter_map(|e| e.weights.get(metric))
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            })
    }

    /// Number of distinct edges incident to `id` (a self-loop counts once).
    pub fn degree(&self, id: &str) -> usize {
        self.edges.iter().filter(|e| e.key.touches(id)).count()
    }

    /// Sorted neighbors of `id`, itself included if it has a self-loop.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.edges.iter().filter_map(|e| e.key.other(id)).collect()
    }

    /// JSON persisted form, embedding the content hash.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let record = GraphRecord {
            content_hash: self.content_hash.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        };
        Ok(serde_json::to_vec(&record)?)
    }

    /// Inverse of [`Graph::serialize`]. Fails with `IntegrityError` if the
    /// embedded hash does not match the decoded content.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let record: GraphRecord = serde_json::from_slice(bytes)?;
        let graph = Self::from_parts(
            record.nodes,
            record.edges.into_iter().map(|e| (e.key, e.weights)),
        );
        if graph.content_hash != record.content_hash {
            return Err(Error::IntegrityError(format!(
                "graph hash mismatch: stored {}, computed {}",
                record.content_hash, graph.content_hash
            )));
        }
        debug!(hash = %graph.content_hash, nodes = graph.node_count(), "deserialized graph");
        Ok(graph)
    }

    fn debug_check_invariants(&self) {
        debug_assert!(self.nodes.windows(2).all(|w| w[0] < w[1]), "node ids not sorted/unique");
        debug_assert!(self.edges.windows(2).all(|w| w[0].key < w[1].key), "edge keys not sorted/unique");
        debug_assert!(self.edges.iter().all(|e| e.key.is_canonical()), "non-canonical edge key");
        debug_assert!(
            self.edges.iter().all(|e| self.contains_node(e.key.a()) && self.contains_node(e.key.b())),
            "edge endpoint missing from node set"
        );
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash
    }
}

impl Eq for Graph {}

/// Bit pattern hashed for a weight. All NaN payloads hash alike, and so
/// do `0.0` and `-0.0`, matching how thresholds compare them.
fn weight_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

fn content_digest(nodes: &[NodeId], edges: &[Edge]) -> String {
    fn field(hasher: &mut Sha256, bytes: &[u8]) {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }

    let mut hasher = Sha256::new();
    hasher.update(HASH_DOMAIN);
    hasher.update((nodes.len() as u64).to_le_bytes());
    for node in nodes {
        field(&mut hasher, node.as_bytes());
    }
    hasher.update((edges.len() as u64).to_le_bytes());
    for edge in edges {
        field(&mut hasher, edge.key.a().as_bytes());
        field(&mut hasher, edge.key.b().as_bytes());
        hasher.update((edge.weights.len() as u64).to_le_bytes());
        for (metric, value) in edge.weights.iter() {
            field(&mut hasher, metric.as_bytes());
            hasher.update(weight_bits(value).to_le_bytes());
        }
    }
    hex::encode(hasher.finalize())
}
