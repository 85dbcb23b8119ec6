//! The loaded, immutable index shared by every request.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, VectorDbError};
use crate::index::{file, Index, IndexKind};
use crate::metric::MetricType;

/// Id written into result slots that have no neighbor.
pub const SENTINEL_ID: i64 = -1;

/// Neighbors for a batch of queries, `top_k` slots per query, best-first.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub ids: Vec<i64>,
    pub distances: Vec<f32>,
}

/// Snapshot of the handle's attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub path: String,
    pub kind: IndexKind,
    pub dimension: usize,
    pub metric_type: MetricType,
    pub element_count: usize,
}

/// Owns one loaded index for the lifetime of the process.
///
/// Dimension, metric and element count are fixed once loaded. All methods
/// take `&self`, so the handle is shared as `Arc<IndexHandle>`.
#[derive(Debug)]
pub struct IndexHandle {
    path: PathBuf,
    index: Box<dyn Index>,
}

impl IndexHandle {
    /// Load and verify an index file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let index = file::read(path)?
            .into_index()
            .map_err(|e| VectorDbError::Load {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!(
            path = %path.display(),
            kind = %index.kind(),
            dimension = index.dimension(),
            metric = %index.metric(),
            ntotal = index.len(),
            "index loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            index,
        })
    }

    /// Wrap an index that was built in memory. `path` is only descriptive.
    pub fn from_index(path: impl Into<PathBuf>, index: Box<dyn Index>) -> Self {
        Self {
            path: path.into(),
            index,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn metric(&self) -> MetricType {
        self.index.metric()
    }

    pub fn element_count(&self) -> usize {
        self.index.len()
    }

    pub fn metadata(&self) -> IndexMetadata {
        IndexMetadata {
            path: self.path.display().to_string(),
            kind: self.index.kind(),
            dimension: self.dimension(),
            metric_type: self.metric(),
            element_count: self.element_count(),
        }
    }

    /// Search `num_vectors` queries packed back to back in `vectors`.
    ///
    /// Returns `num_vectors * top_k` slots. Query `i`'s `j`-th neighbor sits
    /// at `i * top_k + j`; slots past the available neighbors hold
    /// [`SENTINEL_ID`] and the metric's worst score.
    pub fn search(&self, num_vectors: usize, vectors: &[f32], top_k: usize) -> Result<SearchResult> {
        let dimension = self.dimension();
        let expected = num_vectors
            .checked_mul(dimension)
            .ok_or_else(|| VectorDbError::Internal("query size overflows".to_string()))?;
        if vectors.len() != expected {
            return Err(VectorDbError::Internal(format!(
                "query buffer holds {} floats, {num_vectors} queries of dimension {dimension} need {expected}",
                vectors.len()
            )));
        }
        let slots = num_vectors
            .checked_mul(top_k)
            .ok_or_else(|| VectorDbError::Internal("result size overflows".to_string()))?;

        let metric = self.metric();
        let mut ids = vec![SENTINEL_ID; slots];
        let mut distances = vec![metric.worst_score(); slots];
        if slots == 0 {
            return Ok(SearchResult { ids, distances });
        }

        ids.par_chunks_mut(top_k)
            .zip(distances.par_chunks_mut(top_k))
            .zip(vectors.par_chunks(dimension))
            .try_for_each(|((id_block, dist_block), query)| -> Result<()> {
                let neighbors = self.index.search(query, top_k)?;
                for (j, n) in neighbors.into_iter().take(top_k).enumerate() {
                    id_block[j] = n.id as i64;
                    dist_block[j] = metric.to_score(n.distance);
                }
                Ok(())
            })?;

        debug!(num_vectors, top_k, "batch searched");
        Ok(SearchResult { ids, distances })
    }

    /// Free the index. Consuming `self` makes a second release impossible.
    pub fn release(self) {
        info!(path = %self.path.display(), "releasing index");
        drop(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::file::IndexFile;
    use crate::index::FlatIndex;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn scenario_handle() -> IndexHandle {
        let vectors = vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let index = FlatIndex::from_vectors(MetricType::L2, 4, vectors).unwrap();
        IndexHandle::from_index("memory", Box::new(index))
    }

    #[test]
    fn test_search_scenario() {
        let handle = scenario_handle();
        let result = handle.search(1, &[0.0; 4], 2).unwrap();
        assert_eq!(result.ids, vec![0, 1]);
        assert_eq!(result.distances, vec![0.0, 4.0]);
    }

    #[test]
    fn test_search_pads_with_sentinels() {
        let handle = scenario_handle();
        let result = handle.search(1, &[0.0; 4], 5).unwrap();
        assert_eq!(result.ids, vec![0, 1, 2, -1, -1]);
        assert_eq!(result.distances[3], f32::INFINITY);
        assert_eq!(result.distances[4], f32::INFINITY);
    }

    #[test]
    fn test_inner_product_sentinel_is_negative_infinity() {
        let index =
            FlatIndex::from_vectors(MetricType::InnerProduct, 2, vec![1.0, 0.0]).unwrap();
        let handle = IndexHandle::from_index("memory", Box::new(index));
        let result = handle.search(1, &[2.0, 0.0], 2).unwrap();
        assert_eq!(result.ids, vec![0, -1]);
        assert_eq!(result.distances, vec![2.0, f32::NEG_INFINITY]);
    }

    #[test]
    fn test_batch_blocks_are_per_query() {
        let handle = scenario_handle();
        let queries = [2.0, 2.0, 2.0, 2.0, 0.0, 0.0, 0.0, 0.0];
        let result = handle.search(2, &queries, 1).unwrap();
        assert_eq!(result.ids, vec![2, 0]);
    }

    #[test]
    fn test_zero_queries_yield_empty_result() {
        let handle = scenario_handle();
        let result = handle.search(0, &[], 3).unwrap();
        assert!(result.ids.is_empty());
        assert!(result.distances.is_empty());
    }

    #[test]
    fn test_length_mismatch_is_internal_error() {
        let handle = scenario_handle();
        let err = handle.search(2, &[0.0; 7], 1).unwrap_err();
        assert!(matches!(err, VectorDbError::Internal(_)));
    }

    #[test]
    fn test_load_and_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scenario.idx");
        let index = FlatIndex::from_vectors(MetricType::L2, 4, vec![0.5; 12]).unwrap();
        file::write(&path, &IndexFile::flat(index)).unwrap();

        let handle = IndexHandle::load(&path).unwrap();
        let meta = handle.metadata();
        assert_eq!(meta.dimension, 4);
        assert_eq!(meta.element_count, 3);
        assert_eq!(meta.metric_type, MetricType::L2);
        assert_eq!(meta.path, path.display().to_string());
        handle.release();
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = IndexHandle::load(dir.path().join("missing.idx")).unwrap_err();
        assert!(matches!(err, VectorDbError::Load { .. }));
    }

    proptest! {
        #[test]
        fn prop_result_shape(num_vectors in 0usize..6, top_k in 1usize..8) {
            let handle = scenario_handle();
            let queries = vec![0.25f32; num_vectors * 4];
            let result = handle.search(num_vectors, &queries, top_k).unwrap();
            prop_assert_eq!(result.ids.len(), num_vectors * top_k);
            prop_assert_eq!(result.distances.len(), num_vectors * top_k);
            for block in result.ids.chunks(top_k) {
                let real = block.iter().filter(|&&id| id != SENTINEL_ID).count();
                prop_assert_eq!(real, top_k.min(3));
            }
            let metric = handle.metric();
            for block in result.distances.chunks(top_k) {
                for pair in block.windows(2) {
                    prop_assert_ne!(
                        metric.compare_scores(pair[0], pair[1]),
                        std::cmp::Ordering::Greater
                    );
                }
            }
        }
    }
}
