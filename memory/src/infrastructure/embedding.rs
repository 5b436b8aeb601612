// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Embedding Seam
//!
//! The core never depends on a live embedding service: the [`Embedder`]
//! trait isolates callers from how vectors are produced, and
//! [`HashingEmbedder`] provides a deterministic in-process default so
//! recall results are reproducible across runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Fixed embedding dimension shared by every store in a process.
pub const EMBEDDING_DIM: usize = 256;

/// Produces fixed-dimension embeddings for discovery payloads.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
    fn dim(&self) -> usize;
}

/// Deterministic feature-hashing embedder.
///
/// Tokenizes on non-alphanumeric boundaries, hashes each lowercase token
/// into a bucket, and L2-normalizes the bucket counts. Two payloads
/// sharing vocabulary land near each other, which is all the similarity
/// structure the engine's tests and local runs need.
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dim;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        vector
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
