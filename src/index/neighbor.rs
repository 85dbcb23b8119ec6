//! Priority queues over search candidates.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate: position of a stored vector and its distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub distance: f32,
    pub id: usize,
}

impl Neighbor {
    pub fn new(id: usize, distance: f32) -> Self {
        Self { distance, id }
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Total order: distance, then id. Equal distances always resolve the same
// way, which keeps repeated searches identical.
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// A wrapper that reverses Neighbor ordering to create a min-heap.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Reversed(Neighbor);

impl PartialOrd for Reversed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reversed {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

/// Max-heap of neighbors (worst on top). Holds the running result set.
#[derive(Debug, Default)]
pub struct MaxHeap {
    heap: BinaryHeap<Neighbor>,
}

impl MaxHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, n: Neighbor) {
        self.heap.push(n);
    }

    /// Keep only the best `limit` neighbors seen so far.
    pub fn push_bounded(&mut self, n: Neighbor, limit: usize) {
        if limit == 0 {
            return;
        }
        if self.heap.len() < limit {
            self.heap.push(n);
        } else if let Some(worst) = self.heap.peek() {
            if n < *worst {
                self.heap.pop();
                self.heap.push(n);
            }
        }
    }

    pub fn peek(&self) -> Option<&Neighbor> {
        self.heap.peek()
    }

    pub fn pop(&mut self) -> Option<Neighbor> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a Vec ordered best-first.
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec()
    }
}

/// Min-heap of neighbors (best on top). Holds the candidate frontier.
#[derive(Debug, Default)]
pub struct MinHeap {
    heap: BinaryHeap<Reversed>,
}

impl MinHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, n: Neighbor) {
        self.heap.push(Reversed(n));
    }

    pub fn pop(&mut self) -> Option<Neighbor> {
        self.heap.pop().map(|r| r.0)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
