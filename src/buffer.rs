//! Contiguous storage for fixed-dimension embedding vectors.
//!
//! Vectors are laid out row-major in a single `Vec<f32>`: row `i` occupies
//! `data[i * dim..(i + 1) * dim]`. The dimension is fixed by the first append
//! and stays fixed until the buffer is cleared.

use crate::error::{Result, SessionError};
use crate::vector::Vector;

/// Append-only buffer of vectors sharing one dimensionality.
#[derive(Debug, Clone, Default)]
pub struct VectorBuffer {
    dim: Option<usize>,
    data: Vec<f32>,
}

impl VectorBuffer {
    /// Create an empty buffer with no established dimension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a buffer from persisted row-major floats.
    pub fn from_raw(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(SessionError::InvalidVector {
                reason: "dimension must be non-zero".to_string(),
            });
        }
        if data.len() % dim != 0 {
            return Err(SessionError::CorruptState(format!(
                "{} floats is not a multiple of dimension {}",
                data.len(),
                dim
            )));
        }
        let dim = if data.is_empty() { None } else { Some(dim) };
        Ok(Self { dim, data })
    }

    /// Append a batch of vectors.
    ///
    /// Every vector is validated before anything is written, so a failed call
    /// leaves the buffer untouched. Vectors must already be normalized.
    pub fn append(&mut self, vectors: &[Vector]) -> Result<()> {
        let first = vectors.first().ok_or(SessionError::EmptyBatch)?;
        let expected = match self.dim {
            Some(dim) => dim,
            None => first.dimension(),
        };
        if expected == 0 {
            return Err(SessionError::InvalidVector {
                reason: "zero-dimensional vector".to_string(),
            });
        }

        if let Some(bad) = vectors.iter().find(|v| v.dimension() != expected) {
            return Err(SessionError::DimensionMismatch {
                expected,
                actual: bad.dimension(),
            });
        }

        self.data.reserve(vectors.len() * expected);
        for v in vectors {
            self.data.extend_from_slice(v.as_slice());
        }
        self.dim = Some(expected);
        Ok(())
    }

    /// Borrow the vector stored at `index`.
    pub fn get(&self, index: usize) -> Result<&[f32]> {
        let len = self.size();
        match self.dim {
            Some(dim) if index < len => Ok(&self.data[index * dim..(index + 1) * dim]),
            _ => Err(SessionError::IndexOutOfRange { index, len }),
        }
    }

    /// Number of stored vectors.
    pub fn size(&self) -> usize {
        match self.dim {
            Some(dim) => self.data.len() / dim,
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The established dimension, or `None` before the first append.
    pub fn dimension(&self) -> Option<usize> {
        self.dim
    }

    /// All stored floats in insertion order.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Iterate rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on 0, and an unset dim means no data anyway
        self.data.chunks_exact(self.dim.unwrap_or(1))
    }

    /// Drop all vectors and forget the dimension.
    pub fn clear(&mut self) {
        self.dim = None;
        self.data = Vec::new();
    }
}
