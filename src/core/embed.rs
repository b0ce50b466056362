//! Embedding provider interface
//!
//! The evaluator only requires referential transparency: identical input must
//! produce identical output, which makes memoization safe. The in-tree
//! `HashEmbedder` is a deterministic token-hash embedder so the pipeline runs
//! without an external model; real deployments plug in their own provider.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::Result;

/// Trait for embedding generators
pub trait Embedder: Send + Sync {
    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate an L2-normalized embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails; the caller treats this
    /// as "no similarity evidence for this pair", not an aborted evaluation.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic token-hash embedder.
///
/// Unigram tokens are hashed into buckets and the vector is L2-normalized.
/// Texts sharing vocabulary land close together, which is enough for tests
/// and offline runs. Same text always yields the same vector.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 64;

    pub fn new() -> Self {
        Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
        }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dimensions as u64) as usize;
            // Sign bit from a higher hash bit spreads tokens across both
            // directions of each axis
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        Ok(vector)
    }
}

/// L2-normalize in place; the zero vector stays zero
fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two L2-normalized vectors (plain dot product)
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x * y) as f64).sum()
}

// =============================================================================
// TESTS
// =============================================================================
