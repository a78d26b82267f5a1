//! Brute-force flat index — exact inner-product k-NN search

use rayon::prelude::*;

use crate::buffer::VectorBuffer;
use crate::error::{Result, SessionError};
use crate::neighbor_queue::{ScoredEntry, TopK};
use crate::vector::{dot, Vector};

/// Scans at or above this many vectors are split across the rayon pool.
pub const PARALLEL_SCAN_THRESHOLD: usize = 4096;

/// A flat index scoring every stored vector by dot product.
///
/// With L2-normalized inputs the score is the cosine similarity.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    buffer: VectorBuffer,
}

impl FlatIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing buffer.
    pub fn from_buffer(buffer: VectorBuffer) -> Self {
        Self { buffer }
    }

    /// Append a batch of normalized vectors.
    pub fn add(&mut self, vectors: &[Vector]) -> Result<()> {
        self.buffer.append(vectors)
    }

    /// Search for the `k` most similar vectors to `query`.
    /// Returns `(index, score)` pairs, best first; ties go to the lower index.
    pub fn search(&self, query: &Vector, k: usize) -> Result<Vec<(usize, f32)>> {
        let dim = match self.buffer.dimension() {
            Some(dim) => dim,
            None => return Ok(vec![]),
        };
        if query.dimension() != dim {
            return Err(SessionError::DimensionMismatch {
                expected: dim,
                actual: query.dimension(),
            });
        }
        if k == 0 {
            return Ok(vec![]);
        }

        let q = query.as_slice();
        let mut top = TopK::new(k.min(self.len()));

        if self.len() >= PARALLEL_SCAN_THRESHOLD {
            let scores: Vec<f32> = self
                .buffer
                .as_flat()
                .par_chunks_exact(dim)
                .map(|row| dot(q, row))
                .collect();
            for (index, score) in scores.into_iter().enumerate() {
                top.push(ScoredEntry::new(index, score));
            }
        } else {
            for (index, row) in self.buffer.rows().enumerate() {
                top.push(ScoredEntry::new(index, dot(q, row)));
            }
        }

        Ok(top
            .into_sorted_vec()
            .into_iter()
            .map(|e| (e.index, e.score))
            .collect())
    }

    pub fn buffer(&self) -> &VectorBuffer {
        &self.buffer
    }

    pub fn dimension(&self) -> Option<usize> {
        self.buffer.dimension()
    }

    pub fn len(&self) -> usize {
        self.buffer.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
