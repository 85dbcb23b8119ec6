//! Read-only search indexes and their on-disk format

pub mod file;
pub mod flat;
pub mod hnsw;
pub mod neighbor;

pub use file::IndexFile;
pub use flat::FlatIndex;
pub use hnsw::{HnswGraph, HnswIndex, HnswParams};
pub use neighbor::Neighbor;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metric::MetricType;

/// A k-NN search backend.
///
/// Ids are the 0-based positions at which vectors were added. Implementations
/// hold no interior mutability, so one instance can be searched from many
/// threads at once.
pub trait Index: Send + Sync + fmt::Debug {
    /// Search for the `k` nearest neighbors of `query`.
    /// Returns at most `k` neighbors sorted best-first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// The metric used by this index.
    fn metric(&self) -> MetricType;

    /// Number of components in every stored vector.
    fn dimension(&self) -> usize;

    /// The number of vectors in this index.
    fn len(&self) -> usize;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> IndexKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Flat,
    Hnsw,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Flat => f.write_str("flat"),
            IndexKind::Hnsw => f.write_str("hnsw"),
        }
    }
}
