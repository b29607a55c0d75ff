//! Per-sample metadata (free-text annotation columns).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::edge::NodeId;
use super::table::{ensure_unique, read_table};
use crate::Result;

/// Sample id → column → value. Cells are kept as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataTable {
    columns: Vec<String>,
    rows: BTreeMap<NodeId, BTreeMap<String, String>>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table_bytes(origin: &str, bytes: &[u8]) -> Result<Self> {
        let table = read_table(origin, bytes)?;
        ensure_unique(origin, "column", &table.columns)?;
        let ids: Vec<NodeId> = table.rows.iter().map(|(id, _)| id.clone()).collect();
        ensure_unique(origin, "sample", &ids)?;

        let rows = table
            .rows
            .into_iter()
            .map(|(id, cells)| {
                let record = table
                    .columns
                    .iter()
                    .cloned()
                    .zip(cells)
                    .filter(|(_, v)| !v.is_empty())
                    .collect();
                (id, record)
            })
            .collect();
        Ok(Self { columns: table.columns, rows })
    }

    pub fn from_table_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::from_table_bytes(&path.display().to_string(), &bytes)
    }

    /// Add or replace one annotation.
    pub fn set(&mut self, sample: impl Into<NodeId>, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        if !self.columns.contains(&column) {
            self.columns.push(column.clone());
        }
        self.rows.entry(sample.into()).or_default().insert(column, value.into());
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, sample: &str, column: &str) -> Option<&str> {
        self.rows.get(sample)?.get(column).map(String::as_str)
    }

    /// All annotations for one sample.
    pub fn record(&self, sample: &str) -> Option<&BTreeMap<String, String>> {
        self.rows.get(sample)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_lookup() {
        let csv = b"sample,species,host\ns1,E. coli,human\ns2,S. aureus,\n";
        let md = MetadataTable::from_table_bytes("md", csv).unwrap();
        assert_eq!(md.len(), 2);
        assert_eq!(md.get("s1", "species"), Some("E. coli"));
        assert_eq!(md.get("s2", "host"), None);
        assert_eq!(md.columns(), &["species".to_string(), "host".to_string()]);
    }

    #[test]
    fn test_set_adds_column() {
        let mut md = MetadataTable::new();
        md.set("s1", "clade", "A");
        assert_eq!(md.columns(), &["clade".to_string()]);
        assert_eq!(md.record("s1").unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        assert!(MetadataTable::from_table_bytes("md", b"id,x\ns1,a\ns1,b\n").is_err());
    }
}
