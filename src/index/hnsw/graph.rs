//! HNSW graph: core data structures and algorithms.
//!
//! Implements the Hierarchical Navigable Small World graph from:
//! "Efficient and robust approximate nearest neighbor search using
//!  Hierarchical Navigable Small World graphs" (Malkov & Yashunin, 2016/2018).
//!
//! The graph is built once, written to an index file, and then only searched.
//! Searching takes `&self` and keeps its visited set on the stack of the call,
//! so any number of threads can search one graph concurrently.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VectorDbError};
use crate::index::neighbor::{MaxHeap, MinHeap, Neighbor};
use crate::metric::MetricType;

/// Configuration parameters for the HNSW index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Max number of connections per node (layers > 0).
    pub m: usize,
    /// Max connections at layer 0 (typically 2 * m).
    pub m_max0: usize,
    /// Number of candidates during construction.
    pub ef_construction: usize,
    /// Number of candidates during search.
    pub ef_search: usize,
    /// Level generation factor: 1 / ln(m).
    pub ml: f64,
    /// Maximum number of layers.
    pub max_layers: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::new(16, 200, 64)
    }
}

impl HnswParams {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize) -> Self {
        let m = m.max(2);
        Self {
            m,
            m_max0: 2 * m,
            ef_construction: ef_construction.max(1),
            ef_search: ef_search.max(1),
            ml: 1.0 / (m as f64).ln(),
            max_layers: 16,
        }
    }
}

/// A node in the HNSW graph. Its vector lives in the graph's shared buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HnswNode {
    /// Neighbors per layer. neighbors[l] is the list of neighbor IDs at layer l.
    neighbors: Vec<Vec<usize>>,
    /// The maximum layer this node was inserted into.
    level: usize,
}

/// The HNSW graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswGraph {
    metric: MetricType,
    dimension: usize,
    params: HnswParams,
    /// Vector `i` is `vectors[i * dimension..(i + 1) * dimension]`.
    vectors: Vec<f32>,
    nodes: Vec<HnswNode>,
    /// Entry point node ID (highest-level node).
    entry_point: Option<usize>,
    /// Current maximum level in the graph.
    max_level: usize,
}

impl HnswGraph {
    pub fn new(metric: MetricType, dimension: usize, params: HnswParams) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorDbError::InvalidArgument(
                "dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            metric,
            dimension,
            params,
            vectors: Vec::new(),
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
        })
    }

    pub fn metric(&self) -> MetricType {
        self.metric
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the vector for a given node ID.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        if id >= self.nodes.len() {
            return None;
        }
        let start = id * self.dimension;
        self.vectors.get(start..start + self.dimension)
    }

    /// Generate a random level for a new node.
    fn random_level(&self, rng: &mut StdRng) -> usize {
        // gen() yields [0, 1); flip it so ln never sees zero.
        let r: f64 = 1.0 - rng.gen::<f64>();
        let level = (-r.ln() * self.params.ml).floor() as usize;
        level.min(self.params.max_layers - 1)
    }

    fn node_vector(&self, id: usize) -> &[f32] {
        let start = id * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Compute distance between a query vector and a node.
    fn distance(&self, query: &[f32], node_id: usize) -> f32 {
        self.metric.distance(query, self.node_vector(node_id))
    }

    /// SEARCH-LAYER: Algorithm 2 from the HNSW paper.
    ///
    /// Search a single layer of the graph for the ef closest neighbors to query.
    /// `ep` is the set of entry points (their IDs).
    fn search_layer(&self, query: &[f32], ep: &[usize], ef: usize, layer: usize) -> Vec<Neighbor> {
        let mut visited = HashSet::new();
        let mut candidates = MinHeap::new(); // closest candidate on top
        let mut results = MaxHeap::new(); // furthest result on top

        for &ep_id in ep {
            let dist = self.distance(query, ep_id);
            visited.insert(ep_id);
            candidates.push(Neighbor::new(ep_id, dist));
            results.push(Neighbor::new(ep_id, dist));
        }

        while let Some(c) = candidates.pop() {
            // If the closest candidate is further than the furthest result, stop
            let furthest_dist = results.peek().map(|n| n.distance).unwrap_or(f32::MAX);
            if c.distance > furthest_dist {
                break;
            }

            let node = &self.nodes[c.id];
            let Some(layer_neighbors) = node.neighbors.get(layer) else {
                continue;
            };
            for &neighbor_id in layer_neighbors {
                if !visited.insert(neighbor_id) {
                    continue;
                }

                let dist = self.distance(query, neighbor_id);
                let furthest_dist = results.peek().map(|n| n.distance).unwrap_or(f32::MAX);

                if dist < furthest_dist || results.len() < ef {
                    candidates.push(Neighbor::new(neighbor_id, dist));
                    results.push(Neighbor::new(neighbor_id, dist));
                    if results.len() > ef {
                        results.pop(); // remove furthest
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Select the M closest neighbors from candidates (simple selection, Algorithm 3).
    fn select_neighbors_simple(candidates: &[Neighbor], m: usize) -> Vec<usize> {
        candidates.iter().take(m).map(|n| n.id).collect()
    }

    /// Prune a node's neighbor list at a given layer to at most `m` neighbors.
    fn prune_neighbors(&mut self, node_id: usize, layer: usize, m: usize) {
        let Some(neighbor_ids) = self.nodes[node_id].neighbors.get(layer) else {
            return;
        };

        let base = self.node_vector(node_id);
        let mut scored: Vec<Neighbor> = neighbor_ids
            .iter()
            .map(|&nid| Neighbor::new(nid, self.metric.distance(base, self.node_vector(nid))))
            .collect();
        scored.sort();
        scored.truncate(m);

        self.nodes[node_id].neighbors[layer] = scored.into_iter().map(|n| n.id).collect();
    }

    /// INSERT: Algorithm 1 from the HNSW paper. Returns the new node's id.
    pub fn insert(&mut self, vector: &[f32], rng: &mut StdRng) -> Result<usize> {
        if vector.len() != self.dimension {
            return Err(VectorDbError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let level = self.random_level(rng);
        let id = self.nodes.len();
        self.vectors.extend_from_slice(vector);
        self.nodes.push(HnswNode {
            neighbors: vec![Vec::new(); level + 1],
            level,
        });

        // If this is the first node, set it as entry point
        let entry_point = match self.entry_point {
            None => {
                self.entry_point = Some(id);
                self.max_level = level;
                return Ok(id);
            }
            Some(ep) => ep,
        };

        let mut ep_id = entry_point;
        let current_max_level = self.max_level;

        // Phase 1: Greedy descent from top layer down to level+1 (ef=1)
        if current_max_level > level {
            for l in (level + 1..=current_max_level).rev() {
                let nearest = self.search_layer(vector, &[ep_id], 1, l);
                if let Some(n) = nearest.first() {
                    ep_id = n.id;
                }
            }
        }

        // Phase 2: Insert at layers min(level, current_max_level) down to 0
        let insert_from = level.min(current_max_level);
        for l in (0..=insert_from).rev() {
            let m = if l == 0 {
                self.params.m_max0
            } else {
                self.params.m
            };

            let nearest = self.search_layer(vector, &[ep_id], self.params.ef_construction, l);
            let neighbors = Self::select_neighbors_simple(&nearest, m);
            self.nodes[id].neighbors[l] = neighbors.clone();

            // Add bidirectional connections
            for &neighbor_id in &neighbors {
                let needs_pruning = match self.nodes[neighbor_id].neighbors.get_mut(l) {
                    Some(list) => {
                        list.push(id);
                        list.len() > m
                    }
                    None => false,
                };
                if needs_pruning {
                    self.prune_neighbors(neighbor_id, l, m);
                }
            }

            // Update ep for next layer
            if let Some(n) = nearest.first() {
                ep_id = n.id;
            }
        }

        // Update entry point if new node has a higher level
        if level > self.max_level {
            self.entry_point = Some(id);
            self.max_level = level;
        }

        Ok(id)
    }

    /// SEARCH: Algorithm 5 from the HNSW paper.
    ///
    /// Search for the k nearest neighbors, using ef candidates.
    pub fn search_knn(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(VectorDbError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let Some(entry_point) = self.entry_point else {
            return Ok(vec![]);
        };
        if k == 0 {
            return Ok(vec![]);
        }

        let mut ep_id = entry_point;

        // Phase 1: Greedy descent from top layer to layer 1 (ef=1)
        for l in (1..=self.max_level).rev() {
            let nearest = self.search_layer(query, &[ep_id], 1, l);
            if let Some(n) = nearest.first() {
                ep_id = n.id;
            }
        }

        // Phase 2: Search layer 0 with max(ef, k) candidates
        let ef_actual = ef.max(k);
        let mut results = self.search_layer(query, &[ep_id], ef_actual, 0);

        results.truncate(k);
        Ok(results)
    }

    /// Check structural consistency of a graph read from disk.
    ///
    /// Searching trusts ids and levels, so a decoded graph must be checked
    /// before it is served.
    pub(crate) fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| Err(VectorDbError::SerializationError(msg));

        if self.dimension == 0 {
            return corrupt("hnsw graph has zero dimension".to_string());
        }
        if self.params.max_layers == 0 {
            return corrupt("hnsw graph allows zero layers".to_string());
        }
        let expected = self.nodes.len().checked_mul(self.dimension);
        if expected != Some(self.vectors.len()) {
            return corrupt(format!(
                "vector buffer holds {} floats, {} nodes of dimension {} need {:?}",
                self.vectors.len(),
                self.nodes.len(),
                self.dimension,
                expected
            ));
        }

        match self.entry_point {
            None if !self.nodes.is_empty() => {
                return corrupt("non-empty graph has no entry point".to_string());
            }
            Some(ep) if ep >= self.nodes.len() => {
                return corrupt(format!("entry point {ep} out of range"));
            }
            Some(ep) if self.nodes[ep].level != self.max_level => {
                return corrupt(format!(
                    "entry point level {} != max level {}",
                    self.nodes[ep].level, self.max_level
                ));
            }
            _ => {}
        }

        for (id, node) in self.nodes.iter().enumerate() {
            if node.neighbors.len() != node.level + 1 || node.level > self.max_level {
                return corrupt(format!("node {id} has inconsistent level {}", node.level));
            }
            if let Some(bad) = node
                .neighbors
                .iter()
                .flatten()
                .find(|&&nid| nid >= self.nodes.len())
            {
                return corrupt(format!("node {id} links to missing node {bad}"));
            }
        }
        Ok(())
    }
}
