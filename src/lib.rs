//! # biograph: Sample Networks from Distance Matrices
//!
//! The computational core behind an interactive sample-exploration
//! dashboard: turn distance matrices into a multi-metric sample graph,
//! filter it declaratively, and memoize every filter result under a
//! content hash so repeated UI interactions never recompute.
//!
//! ## Design Principles
//!
//! 1. **Immutable graphs**: a built `Graph` is never mutated; filtering
//!    always produces a fresh one
//! 2. **Content identity**: graphs, cache keys and blobs are named by
//!    SHA-256 over their canonical content
//! 3. **Injected stores**: the cache and blob stores are constructed by
//!    the caller and passed in, never global
//! 4. **Cache is optional**: a failing cache store degrades to recompute
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use biograph::{Explorer, FilterParameters, Threshold};
//!
//! # fn example() -> biograph::Result<()> {
//! let explorer = Explorer::open_memory()?;
//! explorer.ingest_matrix("ani", b"id,a,b\na,1,0.98\nb,0.98,1\n")?;
//! let graph_id = explorer.build_graph()?;
//!
//! let params = FilterParameters::new()
//!     .with_threshold("ani", Threshold::inclusive(0.95, 1.0));
//! let filtered = explorer.filter(&graph_id, &params)?;
//! let json = serde_json::to_string(&biograph::export::to_interchange(&filtered))?;
//! # let _ = json;
//! # Ok(())
//! # }
//! ```
//!
//! ## Cache Stores
//!
//! | Store | Config | Description |
//! |-------|--------|-------------|
//! | Memory | `CacheConfig::Memory` (default) | Bounded, optional TTL |
//! | Disk | `CacheConfig::Disk` | File per entry, optional TTL |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod filter;
pub mod cache;
pub mod storage;
pub mod export;
pub mod config;
pub mod hash;

use std::path::Path;

use parking_lot::RwLock;
use tracing::{info, warn};

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    DistanceMatrix, Edge, EdgeKey, EdgeWeights, Graph, MetadataTable, MetricId, NodeId,
    PresenceAbsence,
};

// ============================================================================
// Re-exports: Filtering and caching
// ============================================================================

pub use filter::{
    filter, satisfies, Bound, DegreeRange, FilterParameters, FilteredGraph, MatchPolicy, Threshold,
};
pub use cache::{CacheKey, CacheStats, CacheStore, DiskCacheStore, FilterCache, MemoryCacheStore};
pub use storage::{BlobId, BlobStore};
pub use config::{CacheConfig, ExplorerConfig};

// ============================================================================
// Explorer: the composition root
// ============================================================================

/// Owns the blob store and the filter cache for one process.
///
/// Request handlers are stateless: they hand back blob ids between calls
/// and the explorer reloads the matching graph from the blob store.
pub struct Explorer<S: CacheStore> {
    blobs: BlobStore,
    cache: FilterCache<S>,
    /// Ingested matrices in upload order; one entry per metric id.
    matrices: RwLock<Vec<(MetricId, BlobId)>>,
}

impl<S: CacheStore> Explorer<S> {
    pub fn with_stores(blobs: BlobStore, store: S) -> Self {
        Self {
            blobs,
            cache: FilterCache::new(store),
            matrices: RwLock::new(Vec::new()),
        }
    }

    /// Parse and register a distance matrix table. A failed parse leaves
    /// previously ingested data untouched.
    pub fn ingest_matrix(&self, metric_id: &str, bytes: &[u8]) -> Result<BlobId> {
        let matrix = DistanceMatrix::from_table_bytes(metric_id, bytes)?;
        self.add_matrix(&matrix)
    }

    pub fn ingest_matrix_path(&self, path: impl AsRef<Path>) -> Result<BlobId> {
        let matrix = DistanceMatrix::from_table_path(path)?;
        self.add_matrix(&matrix)
    }

    /// Parse a presence/absence table and register its correlation matrix
    /// under `metric_id`.
    pub fn ingest_presence_absence(&self, metric_id: &str, bytes: &[u8]) -> Result<BlobId> {
        let table = PresenceAbsence::from_table_bytes(metric_id, bytes)?;
        let matrix = table.to_distance_matrix(metric_id)?;
        self.add_matrix(&matrix)
    }

    /// Persist a matrix and register it, replacing any earlier matrix
    /// with the same metric id in place.
    pub fn add_matrix(&self, matrix: &DistanceMatrix) -> Result<BlobId> {
        let id = self.blobs.put_matrix(matrix)?;
        let mut registry = self.matrices.write();
        match registry.iter_mut().find(|(m, _)| m == matrix.metric_id()) {
            Some(slot) => {
                warn!(metric = matrix.metric_id(), "replacing previously ingested matrix");
                slot.1 = id.clone();
            }
            None => registry.push((matrix.metric_id().to_string(), id.clone())),
        }
        info!(metric = matrix.metric_id(), samples = matrix.len(), blob = %id, "ingested matrix");
        Ok(id)
    }

    /// Registered metric ids in ingestion order.
    pub fn metrics(&self) -> Vec<MetricId> {
        self.matrices.read().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Build a graph from every registered matrix and persist it.
    pub fn build_graph(&self) -> Result<BlobId> {
        let ids: Vec<BlobId> = self.matrices.read().iter().map(|(_, id)| id.clone()).collect();
        self.build_graph_from(&ids)
    }

    /// Build a graph from the given matrix blobs, in order, and persist it.
    pub fn build_graph_from(&self, matrix_ids: &[BlobId]) -> Result<BlobId> {
        let matrices = matrix_ids
            .iter()
            .map(|id| self.blobs.load_matrix(id))
            .collect::<Result<Vec<_>>>()?;
        let graph = Graph::build(&matrices);
        self.blobs.put_graph(&graph)
    }

    pub fn load_graph(&self, graph_id: &BlobId) -> Result<Graph> {
        self.blobs.load_graph(graph_id)
    }

    /// Cached filter of a persisted graph.
    pub fn filter(&self, graph_id: &BlobId, params: &FilterParameters) -> Result<FilteredGraph> {
        let graph = self.load_graph(graph_id)?;
        Ok(self.cache.filter(&graph, params))
    }

    /// Cached filter of an in-memory graph.
    pub fn filter_graph(&self, graph: &Graph, params: &FilterParameters) -> FilteredGraph {
        self.cache.filter(graph, params)
    }

    /// Drop all uploaded data: matrix registry, blobs and cached results.
    pub fn reset(&self) -> Result<()> {
        self.matrices.write().clear();
        self.blobs.clear()?;
        self.cache.clear()?;
        info!("explorer reset");
        Ok(())
    }

    pub fn cache(&self) -> &FilterCache<S> {
        &self.cache
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Tear down, removing a temporary blob directory.
    pub fn shutdown(self) -> Result<()> {
        self.blobs.close()
    }
}

/// In-memory cache and a temporary blob store.
impl Explorer<MemoryCacheStore> {
    pub fn open_memory() -> Result<Self> {
        let blobs = BlobStore::temporary(false)?;
        let store = MemoryCacheStore::new(config::DEFAULT_MAX_ENTRIES, None);
        Ok(Self::with_stores(blobs, store))
    }
}

/// Stores chosen at runtime from configuration.
impl Explorer<Box<dyn CacheStore>> {
    pub fn from_config(config: &ExplorerConfig) -> Result<Self> {
        let blobs = match &config.blob_root {
            Some(root) => BlobStore::open(root.clone())?,
            None => BlobStore::temporary(config.debug)?,
        };
        let store = config.cache.open_store()?;
        Ok(Self::with_stores(blobs, store))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Format error in {origin}: {message}")]
    FormatError { origin: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Integrity error: {0}")]
    IntegrityError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
