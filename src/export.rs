//! Graph export: node-link interchange records and GraphML.
//!
//! ```text
//! FilteredGraph → to_interchange()   → {nodes: [...], edges: [...]} → renderer
//!               → to_graph_markup()  → GraphML text                 → download
//! ```
//!
//! Both are pure transforms; nothing here touches the cache or the blob
//! store.
//!
//! Edge attributes are the per-metric weights, nested under `weights`
//! rather than flattened next to `id`/`source`/`target`:
//!
//! ```text
//! {"id": "a-b", "source": "a", "target": "b", "weights": {"ani": 0.97, "mash": "NaN"}}
//! ```
//!
//! Metric ids are user-chosen (file stems), so a flat record could not
//! hold a metric named `source` or `id` without losing data.

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::model::float::non_finite_label;
use crate::model::{EdgeKey, EdgeWeights, Graph, MetadataTable, NodeId};
use crate::Result;

// ============================================================================
// Node-link interchange
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub label: String,
    /// Metadata annotations, when a metadata table was supplied.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Smaller of `"{source}-{target}"` and `"{target}-{source}"`.
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    /// Per-metric edge attributes, keyed by metric id.
    pub weights: EdgeWeights,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interchange {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// Canonical edge record id.
pub fn edge_record_id(source: &str, target: &str) -> String {
    let forward = format!("{source}-{target}");
    let backward = format!("{target}-{source}");
    if forward <= backward { forward } else { backward }
}

/// Node-link records, labels equal to ids.
pub fn to_interchange(graph: &Graph) -> Interchange {
    build_interchange(graph, None, None)
}

/// Node-link records annotated from a metadata table. When `label_column`
/// names a column, its value (if present for the node) becomes the label.
pub fn to_interchange_with_metadata(
    graph: &Graph,
    metadata: &MetadataTable,
    label_column: Option<&str>,
) -> Interchange {
    build_interchange(graph, Some(metadata), label_column)
}

fn build_interchange(
    graph: &Graph,
    metadata: Option<&MetadataTable>,
    label_column: Option<&str>,
) -> Interchange {
    let nodes = graph
        .nodes()
        .iter()
        .map(|id| {
            let attributes = metadata
                .and_then(|m| m.record(id))
                .cloned()
                .unwrap_or_default();
            let label = label_column
                .and_then(|col| attributes.get(col).cloned())
                .unwrap_or_else(|| id.clone());
            NodeRecord { id: id.clone(), label, attributes }
        })
        .collect();

    let edges = graph
        .edges()
        .iter()
        .map(|e| EdgeRecord {
            id: edge_record_id(e.key.a(), e.key.b()),
            source: e.key.a().to_string(),
            target: e.key.b().to_string(),
            weights: e.weights.clone(),
        })
        .collect();

    Interchange { nodes, edges }
}

/// Rebuild a graph from node-link records. Edge direction is discarded
/// and duplicate pairs are merged.
pub fn from_interchange(interchange: &Interchange) -> Graph {
    Graph::from_parts(
        interchange.nodes.iter().map(|n| n.id.clone()),
        interchange
            .edges
            .iter()
            .map(|e| (EdgeKey::new(e.source.as_str(), e.target.as_str()), e.weights.clone())),
    )
}

// ============================================================================
// GraphML
// ============================================================================

/// Write the graph as GraphML: one `double` edge key per metric.
pub fn write_graph_markup(graph: &Graph, writer: &mut dyn Write) -> Result<()> {
    let metrics: Vec<&str> = graph.metrics().into_iter().collect();
    let key_ids: BTreeMap<&str, String> = metrics
        .iter()
        .enumerate()
        .map(|(i, m)| (*m, format!("w{i}")))
        .collect();

    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        writer,
        r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">"#
    )?;
    for metric in &metrics {
        writeln!(
            writer,
            r#"  <key id="{}" for="edge" attr.name="{}" attr.type="double"/>"#,
            key_ids[metric],
            escape_xml(metric)
        )?;
    }
    writeln!(writer, r#"  <graph id="G" edgedefault="undirected">"#)?;

    for node in graph.nodes() {
        writeln!(writer, r#"    <node id="{}"/>"#, escape_xml(node))?;
    }

    for edge in graph.edges() {
        let (a, b) = (edge.key.a(), edge.key.b());
        if edge.weights.is_empty() {
            writeln!(
                writer,
                r#"    <edge source="{}" target="{}"/>"#,
                escape_xml(a),
                escape_xml(b)
            )?;
            continue;
        }
        writeln!(
            writer,
            r#"    <edge source="{}" target="{}">"#,
            escape_xml(a),
            escape_xml(b)
        )?;
        for (metric, value) in edge.weights.iter() {
            writeln!(
                writer,
                r#"      <data key="{}">{}</data>"#,
                key_ids[metric],
                format_double(value)
            )?;
        }
        writeln!(writer, "    </edge>")?;
    }

    writeln!(writer, "  </graph>")?;
    writeln!(writer, "</graphml>")?;
    Ok(())
}

/// GraphML document as a string.
pub fn to_graph_markup(graph: &Graph) -> Result<String> {
    let mut buf = Vec::new();
    write_graph_markup(graph, &mut buf)?;
    // only UTF-8 string data is ever written
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn format_double(v: f64) -> String {
    match non_finite_label(v) {
        Some("inf") => "INF".to_string(),
        Some("-inf") => "-INF".to_string(),
        Some(other) => other.to_string(),
        None => format!("{v}"),
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Graph {
        Graph::from_parts(
            vec!["lonely".to_string()],
            vec![
                (EdgeKey::new("b", "a"), EdgeWeights::new().with("ani", 0.97).with("mash", 0.02)),
                (EdgeKey::new("a", "c"), EdgeWeights::new().with("ani", f64::NAN)),
            ],
        )
    }

    #[test]
    fn test_edge_record_id_is_order_free() {
        assert_eq!(edge_record_id("x", "a"), "a-x");
        assert_eq!(edge_record_id("a", "x"), "a-x");
    }

    #[test]
    fn test_interchange_shape() {
        let ic = to_interchange(&sample());
        assert_eq!(ic.nodes.len(), 4);
        assert_eq!(ic.nodes[0].label, "a");
        assert_eq!(ic.edges.len(), 2);
        let ab = ic.edges.iter().find(|e| e.id == "a-b").unwrap();
        assert_eq!((ab.source.as_str(), ab.target.as_str()), ("a", "b"));
        assert_eq!(ab.weights.get("mash"), Some(0.02));
    }

    #[test]
    fn test_interchange_json_round_trip() {
        let g = sample();
        let json = serde_json::to_string(&to_interchange(&g)).unwrap();
        let back: Interchange = serde_json::from_str(&json).unwrap();
        assert_eq!(from_interchange(&back).content_hash(), g.content_hash());
    }

    #[test]
    fn test_weights_nested_keep_reserved_metric_names() {
        let g = Graph::from_parts(
            Vec::<NodeId>::new(),
            vec![(EdgeKey::new("a", "b"), EdgeWeights::new().with("source", 0.5).with("id", 2.0))],
        );
        let json = serde_json::to_value(to_interchange(&g)).unwrap();
        let edge = &json["edges"][0];
        assert_eq!(edge["source"], "a");
        assert_eq!(edge["id"], "a-b");
        assert_eq!(edge["weights"]["source"], 0.5);
        assert_eq!(edge["weights"]["id"], 2.0);

        let back: Interchange = serde_json::from_value(json).unwrap();
        assert_eq!(from_interchange(&back).content_hash(), g.content_hash());
    }

    #[test]
    fn test_metadata_label_column() {
        let mut md = MetadataTable::new();
        md.set("a", "species", "E. coli");
        let ic = to_interchange_with_metadata(&sample(), &md, Some("species"));
        let a = ic.nodes.iter().find(|n| n.id == "a").unwrap();
        assert_eq!(a.label, "E. coli");
        assert_eq!(a.attributes.get("species").map(String::as_str), Some("E. coli"));
        let b = ic.nodes.iter().find(|n| n.id == "b").unwrap();
        assert_eq!(b.label, "b");
    }

    #[test]
    fn test_graph_markup() {
        let xml = to_graph_markup(&sample()).unwrap();
        assert!(xml.contains(r#"<key id="w0" for="edge" attr.name="ani" attr.type="double"/>"#));
        assert!(xml.contains(r#"<key id="w1" for="edge" attr.name="mash" attr.type="double"/>"#));
        assert!(xml.contains(r#"<node id="lonely"/>"#));
        assert!(xml.contains(r#"<edge source="a" target="b">"#));
        assert!(xml.contains(r#"<data key="w0">0.97</data>"#));
        assert!(xml.contains(r#"<data key="w0">NaN</data>"#));
        assert_eq!(xml.matches("<edge ").count(), 2);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
