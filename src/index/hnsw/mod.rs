//! HNSW (Hierarchical Navigable Small World) index module.

pub mod graph;

pub use graph::{HnswGraph, HnswParams};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Result, VectorDbError};
use crate::index::neighbor::Neighbor;
use crate::index::{Index, IndexKind};
use crate::metric::MetricType;

/// An HNSW-based approximate nearest neighbor index.
#[derive(Debug, Clone)]
pub struct HnswIndex {
    graph: HnswGraph,
}

impl HnswIndex {
    /// Build an index from packed vectors, inserting them in order.
    ///
    /// The same seed and input always produce the same graph.
    pub fn build(
        metric: MetricType,
        dimension: usize,
        params: HnswParams,
        vectors: &[f32],
        seed: u64,
    ) -> Result<Self> {
        if dimension == 0 || vectors.len() % dimension != 0 {
            return Err(VectorDbError::InvalidArgument(format!(
                "{} floats cannot be split into vectors of dimension {}",
                vectors.len(),
                dimension
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut graph = HnswGraph::new(metric, dimension, params)?;
        for vector in vectors.chunks_exact(dimension) {
            graph.insert(vector, &mut rng)?;
        }
        Ok(Self { graph })
    }

    /// Wrap a graph decoded from an index file.
    pub fn from_graph(graph: HnswGraph) -> Result<Self> {
        graph.validate()?;
        Ok(Self { graph })
    }

    pub fn graph(&self) -> &HnswGraph {
        &self.graph
    }

    pub fn into_graph(self) -> HnswGraph {
        self.graph
    }

    /// Search with a specific ef value for runtime tuning.
    pub fn search_with_ef(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<Neighbor>> {
        self.graph.search_knn(query, k, ef)
    }
}

impl Index for HnswIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.graph.search_knn(query, k, self.graph.params().ef_search)
    }

    fn metric(&self) -> MetricType {
        self.graph.metric()
    }

    fn dimension(&self) -> usize {
        self.graph.dimension()
    }

    fn len(&self) -> usize {
        self.graph.len()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Hnsw
    }
}
