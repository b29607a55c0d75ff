//! End-to-end tests for the filter pipeline.
//!
//! Each test builds a graph from matrices, filters it, and compares node
//! and edge *sets*; construction order is never asserted.

use std::collections::BTreeSet;

use biograph::{
    filter, Bound, DistanceMatrix, FilterParameters, Graph, MatchPolicy, NodeId, Threshold,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ============================================================================
// Helpers
// ============================================================================

fn matrix(metric: &str, labels: &[&str], rows: &[&[f64]]) -> DistanceMatrix {
    DistanceMatrix::new(
        metric,
        labels.iter().map(|s| s.to_string()).collect(),
        rows.iter().map(|r| r.to_vec()).collect(),
    )
    .unwrap()
}

fn node_set(g: &Graph) -> BTreeSet<&str> {
    g.nodes().iter().map(String::as_str).collect()
}

fn edge_set(g: &Graph) -> BTreeSet<(String, String)> {
    g.edges()
        .iter()
        .map(|e| (e.key.a().to_string(), e.key.b().to_string()))
        .collect()
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

/// A-B-C path: adjacent pairs at distance 1, A-C at 10.
fn path_graph() -> Graph {
    Graph::build(&[matrix(
        "d",
        &["A", "B", "C"],
        &[&[0.0, 1.0, 10.0], &[1.0, 0.0, 1.0], &[10.0, 1.0, 0.0]],
    )])
}

// ============================================================================
// 1. Threshold boundaries through the whole pipeline
// ============================================================================

#[test]
fn test_half_open_threshold() {
    let g = Graph::build(&[matrix(
        "d",
        &["a", "b", "c", "e"],
        &[
            &[0.0, 5.0, 10.0, 7.5],
            &[5.0, 0.0, f64::NAN, 20.0],
            &[10.0, f64::NAN, 0.0, 20.0],
            &[7.5, 20.0, 20.0, 0.0],
        ],
    )]);
    let params = FilterParameters::new()
        .with_threshold("d", Threshold::new(Bound::Inclusive, 5.0, Bound::Exclusive, 10.0));
    let out = filter(&g, &params);
    assert_eq!(edge_set(&out), [pair("a", "b"), pair("a", "e")].into_iter().collect());
}

// ============================================================================
// 2. ALL vs ANY
// ============================================================================

#[test]
fn test_all_rejects_any_accepts() {
    let labels = ["a", "b"];
    let g = Graph::build(&[
        matrix("pass", &labels, &[&[0.0, 1.0], &[1.0, 0.0]]),
        matrix("fail", &labels, &[&[0.0, 100.0], &[100.0, 0.0]]),
    ]);
    let params = FilterParameters::new()
        .with_threshold("pass", Threshold::inclusive(0.0, 2.0))
        .with_threshold("fail", Threshold::inclusive(0.0, 2.0));

    let all = filter(&g, &params.clone().with_match_policy(MatchPolicy::All));
    assert!(edge_set(&all).is_empty());

    let any = filter(&g, &params.with_match_policy(MatchPolicy::Any));
    assert_eq!(edge_set(&any), [pair("a", "b")].into_iter().collect());
}

#[test]
fn test_all_is_vacuous_without_overlapping_metrics() {
    let g = path_graph();
    let params = FilterParameters::new().with_threshold("unknown", Threshold::inclusive(0.0, 0.0));
    let out = filter(&g, &params);
    assert_eq!(edge_set(&out).len(), 3);
}

// ============================================================================
// 3. Degree filter
// ============================================================================

#[test]
fn test_degree_pulls_in_neighbors() {
    let params = FilterParameters::new()
        .with_threshold("d", Threshold::inclusive(0.5, 1.5))
        .with_degree_range(2, 2);
    let out = filter(&path_graph(), &params);
    assert_eq!(node_set(&out), ["A", "B", "C"].into_iter().collect());
    assert_eq!(edge_set(&out), [pair("A", "B"), pair("B", "C")].into_iter().collect());
}

#[test]
fn test_degree_range_excludes_everything() {
    let params = FilterParameters::new()
        .with_threshold("d", Threshold::inclusive(0.5, 1.5))
        .with_degree_range(5, 9);
    let out = filter(&path_graph(), &params);
    assert!(out.is_empty());
    assert_eq!(out.edge_count(), 0);
}

// ============================================================================
// 4. Nodes of interest
// ============================================================================

#[test]
fn test_node_of_interest_resurrected() {
    let g = Graph::build(&[matrix(
        "d",
        &["X", "Y", "Z"],
        &[&[0.0, 1.0, 50.0], &[1.0, 0.0, 60.0], &[50.0, 60.0, 0.0]],
    )]);
    let params = FilterParameters::new()
        .with_threshold("d", Threshold::inclusive(0.0, 5.0))
        .with_node_of_interest("Z");
    let out = filter(&g, &params);
    assert_eq!(node_set(&out), ["Z"].into_iter().collect());
    assert_eq!(out.degree("Z"), 0);
}

#[test]
fn test_node_of_interest_neighborhood() {
    let params = FilterParameters::new()
        .with_threshold("d", Threshold::inclusive(0.5, 1.5))
        .with_node_of_interest("A");
    let out = filter(&path_graph(), &params);
    // only edges touching A are candidates
    assert_eq!(edge_set(&out), [pair("A", "B")].into_iter().collect());
}

// ============================================================================
// 5. Self-loops
// ============================================================================

#[test]
fn test_self_loops_toggle() {
    let g = path_graph();
    let hidden = filter(&g, &FilterParameters::new());
    assert!(edge_set(&hidden).iter().all(|(a, b)| a != b));

    let shown = filter(&g, &FilterParameters::new().with_self_loops(true));
    assert!(shown.edges().iter().any(|e| e.key.is_self_loop()));
    assert_eq!(shown.edge_count(), 6);
}

// ============================================================================
// 6. Determinism and input immutability
// ============================================================================

proptest! {
    #[test]
    fn filter_is_deterministic(lo in 0.0f64..5.0, width in 0.0f64..5.0, min_deg in 0usize..4, use_any in any::<bool>()) {
        let labels = ["a", "b", "c", "d", "e"];
        let rows: Vec<Vec<f64>> = (0..5)
            .map(|i: usize| (0..5).map(|j: usize| ((i * 7 + j * 7) % 11) as f64 / 2.0 * (i != j) as u8 as f64).collect())
            .collect();
        let m = DistanceMatrix::new("d", labels.iter().map(|s| NodeId::from(*s)).collect(), rows).unwrap();
        let g = Graph::build(&[m]);
        let before = g.content_hash().to_string();

        let params = FilterParameters::new()
            .with_threshold("d", Threshold::inclusive(lo, lo + width))
            .with_degree_range(min_deg, min_deg + 2)
            .with_match_policy(if use_any { MatchPolicy::Any } else { MatchPolicy::All });

        let first = filter(&g, &params);
        let second = filter(&g, &params);
        prop_assert_eq!(node_set(&first), node_set(&second));
        prop_assert_eq!(edge_set(&first), edge_set(&second));
        prop_assert_eq!(first.content_hash(), second.content_hash());
        prop_assert_eq!(g.content_hash(), before.as_str());
    }

    #[test]
    fn filtered_edges_satisfy_thresholds(lo in 0.0f64..3.0, hi in 3.0f64..6.0) {
        let g = Graph::build(&[matrix(
            "d",
            &["a", "b", "c", "d"],
            &[&[0.0, 1.0, 2.0, 3.0], &[1.0, 0.0, 4.0, 5.0], &[2.0, 4.0, 0.0, 6.0], &[3.0, 5.0, 6.0, 0.0]],
        )]);
        let t = Threshold::inclusive(lo, hi);
        let out = filter(&g, &FilterParameters::new().with_threshold("d", t));
        for e in out.edges() {
            prop_assert!(t.satisfies(e.weights.get("d").unwrap()));
        }
        for e in g.edges() {
            let w = e.weights.get("d").unwrap();
            if !e.key.is_self_loop() && t.satisfies(w) {
                prop_assert!(out.edge(e.key.a(), e.key.b()).is_some());
            }
        }
    }
}
