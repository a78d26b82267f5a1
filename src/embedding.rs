//! Embedding providers: map text to fixed-dimension, L2-normalized vectors.

use crate::error::{Result, SessionError};
use crate::vector::Vector;

/// Encodes text into vectors.
///
/// Implementations return exactly one vector per input, in input order, all
/// of length [`dimension`](EmbeddingProvider::dimension) and L2-normalized.
/// The session store rejects output that breaks this contract.
pub trait EmbeddingProvider: Send + Sync {
    /// Output dimension of every vector this provider produces.
    fn dimension(&self) -> usize;

    fn encode(&self, texts: &[String]) -> Result<Vec<Vector>>;
}

/// Deterministic feature-hashing embedder.
///
/// Lower-cased word unigrams and adjacent bigrams are hashed into signed
/// buckets. Identical texts always produce identical vectors, and texts that
/// share vocabulary land close together. Useful when no neural model is wired
/// in, and as a stable embedder for tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(SessionError::Embedding(
                "embedding dimension must be non-zero".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Result<Vector> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut data = vec![0.0f32; self.dimension];
        if tokens.is_empty() {
            // punctuation-only or blank text still needs a non-zero vector
            self.add_feature(&mut data, lowered.trim(), 1.0);
        }
        for token in &tokens {
            self.add_feature(&mut data, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut data, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let mut vector = Vector::new(data);
        vector.normalize()?;
        Ok(vector)
    }

    fn add_feature(&self, data: &mut [f32], feature: &str, weight: f32) {
        let hash = crc32fast::hash(feature.as_bytes());
        let bucket = (hash >> 1) as usize % self.dimension;
        let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
        data[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vector>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}
