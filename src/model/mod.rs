//! # Sample Graph Model
//!
//! Input tables and the graph built from them. Everything here is pure
//! data plus parsing: no cache, no blob store, no filtering state.

pub mod edge;
pub mod float;
pub mod graph;
pub mod matrix;
pub mod metadata;
pub mod presence;
pub(crate) mod table;

pub use edge::{Edge, EdgeKey, EdgeWeights, MetricId, NodeId};
pub use graph::Graph;
pub use matrix::DistanceMatrix;
pub use metadata::MetadataTable;
pub use presence::{pearson, PresenceAbsence, CORRELATION_DECIMALS};
