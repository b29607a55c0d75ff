//! Distance matrices and pairwise extraction.

use std::collections::BTreeMap;
use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::edge::{EdgeKey, MetricId, NodeId};
use super::table::{ensure_unique, format_error, parse_cell, read_table};
use crate::Result;

/// A named, square table of scalar distances/affinities between samples.
///
/// Symmetry is assumed, never checked: only the upper triangle
/// (diagonal included) is ever read. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    metric_id: MetricId,
    labels: Vec<NodeId>,
    /// Row-major, `labels.len()²` entries.
    #[serde(with = "values_serde")]
    values: Vec<f64>,
    #[serde(with = "super::float")]
    min_value: f64,
    #[serde(with = "super::float")]
    max_value: f64,
}

impl DistanceMatrix {
    /// Build from labels and rows. Rows must be square over `labels` and
    /// labels must be unique.
    pub fn new(
        metric_id: impl Into<MetricId>,
        labels: Vec<NodeId>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let metric_id = metric_id.into();
        let n = labels.len();
        ensure_unique(&metric_id, "sample", &labels)?;
        if rows.len() != n {
            return Err(format_error(
                &metric_id,
                format!("matrix has {} rows for {n} labels", rows.len()),
            ));
        }
        let mut values = Vec::with_capacity(n * n);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(format_error(
                    &metric_id,
                    format!("row {} has {} values, expected {n}", labels[i], row.len()),
                ));
            }
            values.extend(row);
        }
        Ok(Self::from_parts(metric_id, labels, values))
    }

    fn from_parts(metric_id: MetricId, labels: Vec<NodeId>, values: Vec<f64>) -> Self {
        let (min_value, max_value) = extrema(&values);
        Self { metric_id, labels, values, min_value, max_value }
    }

    /// Parse a square CSV/TSV table. Row and column identifiers must name
    /// the same samples; rows are reordered to match the column order.
    pub fn from_table_bytes(metric_id: impl Into<MetricId>, bytes: &[u8]) -> Result<Self> {
        let metric_id = metric_id.into();
        let table = read_table(&metric_id, bytes)?;
        ensure_unique(&metric_id, "column", &table.columns)?;

        let row_ids: Vec<NodeId> = table.rows.iter().map(|(id, _)| id.clone()).collect();
        ensure_unique(&metric_id, "row", &row_ids)?;
        if row_ids.len() != table.columns.len() {
            return Err(format_error(
                &metric_id,
                format!(
                    "matrix is not square: {} rows, {} columns",
                    row_ids.len(),
                    table.columns.len()
                ),
            ));
        }

        let position: HashMap<&str, usize> = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.as_str(), i))
            .collect();

        let n = table.columns.len();
        let mut values = Vec::with_capacity(n * n);
        for column_id in &table.columns {
            let &row_idx = position.get(column_id.as_str()).ok_or_else(|| {
                format_error(
                    &metric_id,
                    format!("column '{column_id}' has no matching row"),
                )
            })?;
            let (row_id, cells) = &table.rows[row_idx];
            for (cell, col) in cells.iter().zip(&table.columns) {
                values.push(parse_cell(&metric_id, row_id, col, cell)?);
            }
        }

        let matrix = Self::from_parts(metric_id, table.columns, values);
        debug!(metric = %matrix.metric_id, samples = matrix.len(), "parsed distance matrix");
        Ok(matrix)
    }

    /// Parse a table file; the metric id is the file stem.
    pub fn from_table_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metric_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = std::fs::read(path)?;
        Self::from_table_bytes(metric_id, &bytes)
    }

    pub fn metric_id(&self) -> &str {
        &self.metric_id
    }

    pub fn labels(&self) -> &[NodeId] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Value at `(row, col)` by position.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.labels.len() + col]
    }

    /// Smallest non-NaN value, NaN if there is none.
    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    /// Largest non-NaN value, NaN if there is none.
    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    /// Pairwise extraction: one entry per upper-triangle cell, diagonal
    /// included, keyed by canonical pair. The lower triangle is never
    /// read, so asymmetric input is silently ignored. NaN passes through.
    pub fn pairs(&self) -> BTreeMap<EdgeKey, f64> {
        let n = self.labels.len();
        let mut out = BTreeMap::new();
        for i in 0..n {
            for j in i..n {
                let key = EdgeKey::new(self.labels[i].as_str(), self.labels[j].as_str());
                debug_assert!(key.is_canonical());
                out.insert(key, self.get(i, j));
            }
        }
        out
    }
}

fn extrema(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((f64::NAN, f64::NAN))
}

/// `Vec<f64>` with the non-finite-safe float encoding.
mod values_serde {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    struct Cell(f64);

    impl Serialize for Cell {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            super::super::float::serialize(&self.0, s)
        }
    }

    impl<'de> Deserialize<'de> for Cell {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            super::super::float::deserialize(d).map(Cell)
        }
    }

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&Cell(*v))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        Ok(Vec::<Cell>::deserialize(d)?.into_iter().map(|c| c.0).collect())
    }
}
