//! # Content-Addressed Blob Store
//!
//! Persists serialized graphs and matrices between stateless requests.
//! Each blob is named by the SHA-256 of its bytes, so identical content
//! is stored once and a name always refers to the same bytes.
//!
//! The default store lives in a process-scoped temporary directory that
//! disappears on drop (or [`BlobStore::close`]). In debug mode the
//! directory is left behind for inspection.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

use crate::hash::sha256_hex;
use crate::model::{DistanceMatrix, Graph};
use crate::{Error, Result};

const BLOB_EXT: &str = "blob";

// ============================================================================
// BlobId
// ============================================================================

/// Hex SHA-256 naming one blob. Parsing rejects anything else, so an id
/// can never escape the store directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobId(String);

impl BlobId {
    pub fn of(bytes: &[u8]) -> Self {
        Self(sha256_hex(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BlobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::StorageError(format!("invalid blob id '{s}'")))
        }
    }
}

impl TryFrom<String> for BlobId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<BlobId> for String {
    fn from(id: BlobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// BlobStore
// ============================================================================

pub struct BlobStore {
    root: PathBuf,
    /// Present when this store owns a temp dir it should remove.
    temp: Option<TempDir>,
}

impl BlobStore {
    /// Process-scoped temporary store. Removed on drop unless `debug`.
    pub fn temporary(debug: bool) -> Result<Self> {
        if debug {
            let kept = tempfile::Builder::new()
                .prefix("biograph-debug-")
                .keep(true)
                .tempdir()?;
            let root = kept.path().to_path_buf();
            info!(root = %root.display(), "blob store (debug, kept on shutdown)");
            return Ok(Self { root, temp: None });
        }
        let temp = tempfile::Builder::new().prefix("biograph-").tempdir()?;
        let root = temp.path().to_path_buf();
        info!(root = %root.display(), "blob store (temporary)");
        Ok(Self { root, temp: Some(temp) })
    }

    /// Store rooted at an existing or new directory; never removed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!(root = %root.display(), "blob store (persistent)");
        Ok(Self { root, temp: None })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        self.root.join(format!("{id}.{BLOB_EXT}"))
    }

    pub fn contains(&self, id: &BlobId) -> bool {
        self.blob_path(id).is_file()
    }

    /// Write `bytes` if not already present and return their id.
    pub fn put(&self, bytes: &[u8]) -> Result<BlobId> {
        let id = BlobId::of(bytes);
        let path = self.blob_path(&id);
        if path.is_file() {
            return Ok(id);
        }
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        debug!(%id, size = bytes.len(), "stored blob");
        Ok(id)
    }

    /// Read a blob, verifying its bytes still hash to its id.
    pub fn get(&self, id: &BlobId) -> Result<Vec<u8>> {
        let bytes = match fs::read(self.blob_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("blob {id}")));
            }
            Err(e) => return Err(e.into()),
        };
        if BlobId::of(&bytes) != *id {
            return Err(Error::IntegrityError(format!("blob {id} content does not match its id")));
        }
        Ok(bytes)
    }

    pub fn put_graph(&self, graph: &Graph) -> Result<BlobId> {
        self.put(&graph.serialize()?)
    }

    pub fn load_graph(&self, id: &BlobId) -> Result<Graph> {
        Graph::deserialize(&self.get(id)?)
    }

    pub fn put_matrix(&self, matrix: &DistanceMatrix) -> Result<BlobId> {
        self.put(&serde_json::to_vec(matrix)?)
    }

    pub fn load_matrix(&self, id: &BlobId) -> Result<DistanceMatrix> {
        Ok(serde_json::from_slice(&self.get(id)?)?)
    }

    /// Remove every blob, keeping the directory.
    pub fn clear(&self) -> Result<()> {
        let mut removed = 0usize;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == BLOB_EXT) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!(removed, "cleared blob store");
        Ok(())
    }

    /// Tear down. Removes the directory when it is a temporary one.
    pub fn close(self) -> Result<()> {
        if let Some(temp) = self.temp {
            temp.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    #[test]
    fn test_put_is_content_addressed() {
        let store = BlobStore::temporary(false).unwrap();
        let a = store.put(b"hello").unwrap();
        let b = store.put(b"hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.get(&a).unwrap(), b"hello");
        assert_ne!(a, store.put(b"world").unwrap());
    }

    #[test]
    fn test_missing_blob_not_found() {
        let store = BlobStore::temporary(false).unwrap();
        let id = BlobId::of(b"never stored");
        assert!(matches!(store.get(&id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_tampered_blob_detected() {
        let store = BlobStore::temporary(false).unwrap();
        let id = store.put(b"original").unwrap();
        fs::write(store.blob_path(&id), b"changed").unwrap();
        assert!(matches!(store.get(&id), Err(Error::IntegrityError(_))));
    }

    #[test]
    fn test_blob_id_rejects_paths() {
        assert!("../../etc/passwd".parse::<BlobId>().is_err());
        assert!("ABCDEF".parse::<BlobId>().is_err());
        let ok = BlobId::of(b"x");
        assert_eq!(ok.as_str().parse::<BlobId>().unwrap(), ok);
        assert!(serde_json::from_str::<BlobId>("\"nope\"").is_err());
    }

    #[test]
    fn test_temporary_removed_on_close() {
        let store = BlobStore::temporary(false).unwrap();
        let root = store.root().to_path_buf();
        store.put(b"x").unwrap();
        assert!(root.exists());
        store.close().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_debug_stores_are_isolated_and_kept() {
        let first = BlobStore::temporary(true).unwrap();
        let second = BlobStore::temporary(true).unwrap();
        assert_ne!(first.root(), second.root());

        let id = second.put(b"survives").unwrap();
        first.clear().unwrap();
        assert_eq!(second.get(&id).unwrap(), b"survives");

        let (a, b) = (first.root().to_path_buf(), second.root().to_path_buf());
        first.close().unwrap();
        second.close().unwrap();
        assert!(a.exists() && b.exists());
        fs::remove_dir_all(a).unwrap();
        fs::remove_dir_all(b).unwrap();
    }

    #[test]
    fn test_graph_round_trip() {
        let store = BlobStore::temporary(false).unwrap();
        let g = Graph::from_parts(vec![NodeId::from("a"), NodeId::from("b")], vec![]);
        let id = store.put_graph(&g).unwrap();
        assert_eq!(store.load_graph(&id).unwrap().content_hash(), g.content_hash());
    }

    #[test]
    fn test_clear_removes_blobs() {
        let store = BlobStore::temporary(false).unwrap();
        let id = store.put(b"x").unwrap();
        store.clear().unwrap();
        assert!(!store.contains(&id));
        assert!(store.root().exists());
    }
}
