//! Bounded top-k selection over similarity scores.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A scored position in the index.
#[derive(Debug, Clone, Copy)]
pub struct ScoredEntry {
    pub score: f32,
    pub index: usize,
}

impl ScoredEntry {
    pub fn new(index: usize, score: f32) -> Self {
        Self { score, index }
    }
}

impl PartialEq for ScoredEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredEntry {}

impl PartialOrd for ScoredEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Greater means ranks higher: larger score first, then the earlier insertion.
// NaN sorts below every real score and -0.0 ties with 0.0.
impl Ord for ScoredEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_score(self.score)
            .total_cmp(&rank_score(other.score))
            .then_with(|| other.index.cmp(&self.index))
    }
}

fn rank_score(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else if score == 0.0 {
        0.0
    } else {
        score
    }
}

/// Keeps the `k` best entries seen so far.
///
/// Backed by a min-heap so the worst retained entry sits on top and can be
/// evicted in O(log k).
pub struct TopK {
    heap: BinaryHeap<Reverse<ScoredEntry>>,
    k: usize,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
            k,
        }
    }

    pub fn push(&mut self, entry: ScoredEntry) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(Reverse(entry));
            return;
        }
        if let Some(Reverse(worst)) = self.heap.peek() {
            if entry > *worst {
                self.heap.pop();
                self.heap.push(Reverse(entry));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a Vec ordered best first.
    pub fn into_sorted_vec(self) -> Vec<ScoredEntry> {
        // Reverse's ascending order is the inner descending order
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(e)| e)
            .collect()
    }
}
