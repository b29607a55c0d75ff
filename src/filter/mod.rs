//! # Filter Engine
//!
//! Turns a [`Graph`] plus a declarative [`FilterParameters`] into a new,
//! structurally independent graph. Pure: the input is never touched and
//! the same inputs always give the same node and edge sets.
//!
//! ## Pipeline
//!
//! 1. Seed selection: with nodes of interest, only edges touching one
//!    of them are candidates; otherwise every edge is.
//! 2. Edge predicate: self-loops are dropped unless shown, then every
//!    threshold whose metric the edge carries is evaluated and combined
//!    under the match policy.
//! 3. Edge-induced subgraph of the accepted edges.
//! 4. Degree filter: nodes whose degree lies in range are kept together
//!    with their direct neighbors (one hop, not transitive).
//! 5. Induced subgraph of the accepted edges over the kept nodes.
//! 6. Nodes of interest that fell out are added back, isolated.

pub mod threshold;

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::hash::canonical_json;
use crate::model::{Edge, Graph, MetricId, NodeId};
use crate::Result;

pub use threshold::{satisfies, Bound, Threshold};

/// Output of [`filter`]: always a freshly built graph, never a view.
pub type FilteredGraph = Graph;

/// How per-metric verdicts combine for one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchPolicy {
    /// Every evaluated metric must pass; vacuously true when none is
    /// evaluated.
    #[default]
    All,
    /// At least one evaluated metric must pass.
    Any,
}

/// Inclusive degree window. Decoded through [`DegreeRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "DegreeRangeRecord")]
pub struct DegreeRange {
    pub min: usize,
    pub max: usize,
}

#[derive(Deserialize)]
struct DegreeRangeRecord {
    #[serde(default)]
    min: usize,
    #[serde(default = "unbounded")]
    max: usize,
}

fn unbounded() -> usize {
    usize::MAX
}

impl From<DegreeRangeRecord> for DegreeRange {
    fn from(r: DegreeRangeRecord) -> Self {
        Self::new(r.min, r.max)
    }
}

impl DegreeRange {
    pub fn new(min: usize, max: usize) -> Self {
        if min <= max { Self { min, max } } else { Self { min: max, max: min } }
    }

    pub fn contains(&self, degree: usize) -> bool {
        self.min <= degree && degree <= self.max
    }
}

impl Default for DegreeRange {
    fn default() -> Self {
        Self { min: 0, max: usize::MAX }
    }
}

/// Complete description of one filtering request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterParameters {
    /// Seed nodes; empty means every node is eligible.
    #[serde(default)]
    pub node_of_interest: BTreeSet<NodeId>,
    #[serde(default)]
    pub thresholds: BTreeMap<MetricId, Threshold>,
    #[serde(default)]
    pub match_policy: MatchPolicy,
    #[serde(default)]
    pub degree_range: DegreeRange,
    #[serde(default)]
    pub show_self_loops: bool,
    /// Display layout name. Presentation only: ignored by the engine and
    /// left out of cache keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
}

/// The fields of [`FilterParameters`] that shape the output graph.
#[derive(Serialize)]
struct StructuralParams<'a> {
    node_of_interest: &'a BTreeSet<NodeId>,
    thresholds: &'a BTreeMap<MetricId, Threshold>,
    match_policy: MatchPolicy,
    degree_range: DegreeRange,
    show_self_loops: bool,
}

impl FilterParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// One inclusive threshold per metric spanning its observed range,
    /// so every non-NaN edge passes.
    pub fn spanning(graph: &Graph) -> Self {
        let thresholds = graph
            .metrics()
            .into_iter()
            .filter_map(|m| graph.metric_range(m).map(|(lo, hi)| (m.to_string(), Threshold::spanning(lo, hi))))
            .collect();
        Self { thresholds, ..Self::default() }
    }

    pub fn with_threshold(mut self, metric: impl Into<MetricId>, threshold: Threshold) -> Self {
        self.thresholds.insert(metric.into(), threshold);
        self
    }

    pub fn with_node_of_interest(mut self, node: impl Into<NodeId>) -> Self {
        self.node_of_interest.insert(node.into());
        self
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    pub fn with_degree_range(mut self, min: usize, max: usize) -> Self {
        self.degree_range = DegreeRange::new(min, max);
        self
    }

    pub fn with_self_loops(mut self, show: bool) -> Self {
        self.show_self_loops = show;
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Canonical JSON of the structural fields only (sorted keys).
    pub fn structural_bytes(&self) -> Result<Vec<u8>> {
        canonical_json(&StructuralParams {
            node_of_interest: &self.node_of_interest,
            thresholds: &self.thresholds,
            match_policy: self.match_policy,
            degree_range: self.degree_range,
            show_self_loops: self.show_self_loops,
        })
    }

    /// Edge predicate (pipeline step 2).
    pub fn accepts(&self, edge: &Edge) -> bool {
        if !self.show_self_loops && edge.key.is_self_loop() {
            return false;
        }
        // Metrics the edge lacks are skipped, not failed.
        let verdicts: SmallVec<[bool; 4]> = self
            .thresholds
            .iter()
            .filter_map(|(metric, t)| edge.weights.get(metric).map(|w| t.satisfies(w)))
            .collect();
        match self.match_policy {
            MatchPolicy::All => verdicts.iter().all(|v| *v),
            MatchPolicy::Any => verdicts.iter().any(|v| *v),
        }
    }

    fn is_seed_edge(&self, edge: &Edge) -> bool {
        self.node_of_interest.is_empty()
            || self.node_of_interest.contains(edge.key.a())
            || self.node_of_interest.contains(edge.key.b())
    }
}

/// Run the full pipeline. Never fails: an empty result is an empty graph.
pub fn filter(graph: &Graph, params: &FilterParameters) -> FilteredGraph {
    let edges = graph.edges();

    // 1-2: indices of accepted edges in the source arena
    let accepted: Vec<usize> = edges
        .iter()
        .enumerate()
        .filter(|(_, e)| params.is_seed_edge(e) && params.accepts(e))
        .map(|(i, _)| i)
        .collect();

    // 3: incidence over the edge-induced subgraph
    let mut incident: HashMap<&str, SmallVec<[usize; 8]>> = HashMap::new();
    for &i in &accepted {
        let key = &edges[i].key;
        incident.entry(key.a()).or_default().push(i);
        if !key.is_self_loop() {
            incident.entry(key.b()).or_default().push(i);
        }
    }

    // 4: degree-qualifying nodes plus their direct neighbors
    let mut kept: HashSet<&str> = HashSet::new();
    for (&node, incident_edges) in &incident {
        if params.degree_range.contains(incident_edges.len()) {
            kept.insert(node);
            for &i in incident_edges {
                if let Some(other) = edges[i].key.other(node) {
                    kept.insert(other);
                }
            }
        }
    }

    // 5: accepted edges with both endpoints kept
    let retained = accepted
        .iter()
        .map(|&i| &edges[i])
        .filter(|e| kept.contains(e.key.a()) && kept.contains(e.key.b()))
        .map(|e| (e.key.clone(), e.weights.clone()));

    // 6: nodes of interest always survive
    let mut nodes: Vec<NodeId> = kept.iter().map(|n| n.to_string()).collect();
    for seed in &params.node_of_interest {
        if !kept.contains(seed.as_str()) {
            if graph.contains_node(seed) {
                nodes.push(seed.clone());
            } else {
                debug!(node = %seed, "node of interest not present in graph");
            }
        }
    }

    let out = Graph::from_parts(nodes, retained);
    debug_assert!(out.edges().iter().all(|e| params.accepts(e)));
    debug!(
        source = %graph.content_hash(),
        accepted = accepted.len(),
        nodes = out.node_count(),
        edges = out.edge_count(),
        "filtered graph"
    );
    out
}
