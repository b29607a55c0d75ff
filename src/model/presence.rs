//! Presence/absence tables and their correlation-derived distance.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::edge::{MetricId, NodeId};
use super::matrix::DistanceMatrix;
use super::table::{ensure_unique, parse_cell, read_table};
use crate::Result;

/// Decimal places kept on correlation values.
pub const CORRELATION_DECIMALS: i32 = 10;

/// Features (rows, e.g. genes) × samples (columns) occurrence table.
///
/// Cells are usually 0/1 but any numeric value is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceAbsence {
    samples: Vec<NodeId>,
    features: Vec<String>,
    /// Column-major: `columns[s][f]` is feature `f` in sample `s`.
    columns: Vec<Vec<f64>>,
}

impl PresenceAbsence {
    pub fn new(samples: Vec<NodeId>, features: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        ensure_unique("presence/absence", "sample", &samples)?;
        let mut columns = vec![Vec::with_capacity(features.len()); samples.len()];
        for (f, row) in rows.iter().enumerate() {
            if row.len() != samples.len() {
                return Err(super::table::format_error(
                    "presence/absence",
                    format!("feature row {f} has {} values, expected {}", row.len(), samples.len()),
                ));
            }
            for (s, v) in row.iter().enumerate() {
                columns[s].push(*v);
            }
        }
        if rows.len() != features.len() {
            return Err(super::table::format_error(
                "presence/absence",
                format!("{} rows for {} features", rows.len(), features.len()),
            ));
        }
        Ok(Self { samples, features, columns })
    }

    pub fn from_table_bytes(origin: &str, bytes: &[u8]) -> Result<Self> {
        let table = read_table(origin, bytes)?;
        let mut features = Vec::with_capacity(table.rows.len());
        let mut rows = Vec::with_capacity(table.rows.len());
        for (feature, cells) in &table.rows {
            let row = cells
                .iter()
                .zip(&table.columns)
                .map(|(cell, sample)| parse_cell(origin, feature, sample, cell))
                .collect::<Result<Vec<_>>>()?;
            features.push(feature.clone());
            rows.push(row);
        }
        let table = Self::new(table.columns, features, rows)?;
        debug!(
            origin,
            samples = table.samples.len(),
            features = table.features.len(),
            "parsed presence/absence table"
        );
        Ok(table)
    }

    pub fn from_table_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::from_table_bytes(&path.display().to_string(), &bytes)
    }

    pub fn samples(&self) -> &[NodeId] {
        &self.samples
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Absolute Pearson correlation between every pair of sample
    /// columns, rounded to [`CORRELATION_DECIMALS`] places. A sample with
    /// zero variance has NaN correlation with everything, itself included.
    pub fn to_distance_matrix(&self, metric_id: impl Into<MetricId>) -> Result<DistanceMatrix> {
        let n = self.samples.len();
        let mut rows = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let r = round_to(pearson(&self.columns[i], &self.columns[j]).abs(), CORRELATION_DECIMALS);
                rows[i][j] = r;
                rows[j][i] = r;
            }
        }
        DistanceMatrix::new(metric_id, self.samples.clone(), rows)
    }
}

/// Pearson correlation coefficient; NaN when either side is constant
/// or when any value is NaN.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return f64::NAN;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round() / scale
}
