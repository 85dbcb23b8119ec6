//! Brute-force flat index: O(n) exact k-NN search

use serde::{Deserialize, Serialize};

use crate::error::{Result, VectorDbError};
use crate::index::neighbor::{MaxHeap, Neighbor};
use crate::index::{Index, IndexKind};
use crate::metric::MetricType;

/// A flat index that computes the distance to every stored vector.
///
/// Vectors live back to back in one buffer; vector `i` occupies
/// `vectors[i * dimension..(i + 1) * dimension]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    metric: MetricType,
    dimension: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Wrap an already packed buffer.
    pub fn from_vectors(metric: MetricType, dimension: usize, vectors: Vec<f32>) -> Result<Self> {
        let index = Self {
            metric,
            dimension,
            vectors,
        };
        index.validate()?;
        Ok(index)
    }

    /// Check the buffer is consistent with the declared dimension.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VectorDbError::SerializationError(
                "flat index has zero dimension".to_string(),
            ));
        }
        if self.vectors.len() % self.dimension != 0 {
            return Err(VectorDbError::SerializationError(format!(
                "vector buffer of {} floats is not a multiple of dimension {}",
                self.vectors.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

impl Index for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(VectorDbError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut heap = MaxHeap::with_capacity(k.min(self.len()) + 1);
        for (id, stored) in self.vectors.chunks_exact(self.dimension).enumerate() {
            let distance = self.metric.distance(query, stored);
            heap.push_bounded(Neighbor::new(id, distance), k);
        }
        Ok(heap.into_sorted_vec())
    }

    fn metric(&self) -> MetricType {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }
}
