//! Phrase embeddings for semantic routing
//!
//! The default embedder is a deterministic hashed bag-of-words: each token is
//! hashed into a fixed-size bucket vector which is then L2-normalized. It is
//! cheap enough to run per utterance and needs no model download; a remote
//! embedding service can be slotted in behind the same trait.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::RouterError;

/// Embedding backend used by the router
pub trait Embedder: Send + Sync {
    /// Fixed dimensionality of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed a text into a vector of `dimension()` components
    fn embed(&self, text: &str) -> Result<Vec<f32>, RouterError>;
}

/// Deterministic hashed bag-of-words embedder
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, RouterError> {
        let mut vector = vec![0.0; self.dimension];

        if text.trim().is_empty() {
            return Ok(vector);
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimension;
            vector[idx] += 1.0;
        }
        normalize_vector(&mut vector);
        Ok(vector)
    }
}

fn normalize_vector(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}

/// Cosine similarity between two vectors, 0.0 when either is degenerate
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let numerator = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>();
    let denom_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if denom_a == 0.0 || denom_b == 0.0 {
        0.0
    } else {
        numerator / (denom_a * denom_b)
    }
}
