//! Metric types and distance kernels.
//!
//! Indexes rank candidates by an internal *distance* where smaller is always
//! better. For inner product that distance is the negated similarity, so the
//! same heaps and graph code serve both metrics. [`MetricType::to_score`]
//! turns a distance back into the value reported to callers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The similarity function an index was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    /// Inner product; larger scores are more similar.
    InnerProduct,
    /// Squared Euclidean distance; smaller scores are more similar.
    L2,
}

impl MetricType {
    /// Internal distance between two equal-length vectors (smaller is closer).
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            MetricType::L2 => l2_squared(a, b),
            MetricType::InnerProduct => -inner_product(a, b),
        }
    }

    /// Convert an internal distance into the score reported to callers.
    pub fn to_score(&self, distance: f32) -> f32 {
        match self {
            MetricType::L2 => distance,
            MetricType::InnerProduct => -distance,
        }
    }

    /// Score used for result slots with no neighbor.
    pub fn worst_score(&self) -> f32 {
        self.to_score(f32::INFINITY)
    }

    /// Best-first ordering of two reported scores.
    pub fn compare_scores(&self, a: f32, b: f32) -> Ordering {
        match self {
            MetricType::L2 => a.total_cmp(&b),
            MetricType::InnerProduct => b.total_cmp(&a),
        }
    }

    /// Name used in the RPC schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::InnerProduct => "INNER_PRODUCT",
            MetricType::L2 => "L2",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Squared Euclidean (L2) distance between two vectors
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Dot product of two vectors
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
