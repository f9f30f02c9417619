//! Token embeddings. The engine treats them as opaque; the seeded embedder
//! gives every token a stable pseudo-random unit vector so turns are
//! reproducible without a model.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, token: &str) -> Vec<f32>;
}

pub struct SeededEmbedder {
    dimension: usize,
}

impl SeededEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for SeededEmbedder {
    fn default() -> Self {
        Self::new(crate::constants::EMBEDDING_DIM)
    }
}

/// FNV-1a over the lowercase token. Stable across runs and platforms,
/// unlike `DefaultHasher`.
fn token_seed(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.to_lowercase().bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl Embedder for SeededEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, token: &str) -> Vec<f32> {
        let mut rng = SmallRng::seed_from_u64(token_seed(token));
        let raw: Vec<f32> = (0..self.dimension)
            .map(|_| rng.random_range(-1.0f32..1.0))
            .collect();
        let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return raw;
        }
        raw.into_iter().map(|v| v / norm).collect()
    }
}
