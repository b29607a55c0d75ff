//! Edges of the sample graph: canonical node pairs and their per-metric
//! weights.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sample identifier. Nodes carry no attributes beyond this.
pub type NodeId = String;

/// Name of the distance matrix a weight came from.
pub type MetricId = String;

/// Unordered node pair stored as `(a, b)` with `a <= b`.
///
/// The only way to build one is [`EdgeKey::new`], which sorts its
/// arguments, so `(a, b)` and `(b, a)` can never both exist.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct EdgeKey {
    a: NodeId,
    b: NodeId,
}

impl EdgeKey {
    pub fn new(x: impl Into<NodeId>, y: impl Into<NodeId>) -> Self {
        let (x, y) = (x.into(), y.into());
        if x <= y { Self { a: x, b: y } } else { Self { a: y, b: x } }
    }

    /// Lexicographically smaller endpoint.
    pub fn a(&self) -> &str {
        &self.a
    }

    /// Lexicographically larger endpoint.
    pub fn b(&self) -> &str {
        &self.b
    }

    pub fn is_self_loop(&self) -> bool {
        self.a == self.b
    }

    pub fn touches(&self, node: &str) -> bool {
        self.a == node || self.b == node
    }

    /// The endpoint opposite `from`, if `from` is an endpoint.
    pub fn other(&self, from: &str) -> Option<&str> {
        if from == self.a {
            Some(&self.b)
        } else if from == self.b {
            Some(&self.a)
        } else {
            None
        }
    }

    pub(crate) fn is_canonical(&self) -> bool {
        self.a <= self.b
    }
}

impl From<(String, String)> for EdgeKey {
    fn from((x, y): (String, String)) -> Self {
        Self::new(x, y)
    }
}

impl From<EdgeKey> for (String, String) {
    fn from(key: EdgeKey) -> Self {
        (key.a, key.b)
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

/// Per-metric weights carried by one edge.
///
/// Not every metric has to be present: a pair missing from one matrix
/// simply has no entry for that metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeWeights {
    #[serde(with = "super::float::map")]
    weights: BTreeMap<MetricId, f64>,
}

impl EdgeWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: impl Into<MetricId>, value: f64) -> Self {
        self.insert(metric, value);
        self
    }

    /// Set a weight, returning the previous one for that metric.
    pub fn insert(&mut self, metric: impl Into<MetricId>, value: f64) -> Option<f64> {
        self.weights.insert(metric.into(), value)
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.weights.get(metric).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl FromIterator<(MetricId, f64)> for EdgeWeights {
    fn from_iter<I: IntoIterator<Item = (MetricId, f64)>>(iter: I) -> Self {
        Self { weights: iter.into_iter().collect() }
    }
}

/// An edge: canonical key plus its weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub key: EdgeKey,
    pub weights: EdgeWeights,
}
