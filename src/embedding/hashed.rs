//! Feature-hashing embedding provider.
//!
//! Lowercased alphanumeric tokens are hashed into [`EMBEDDING_DIM`] signed buckets
//! and the counts are L2-normalized. Identical token bags map to identical vectors,
//! texts sharing no tokens are close to orthogonal. No model files, no warm-up.

use anyhow::Result;
use sha2::{Digest, Sha256};

use super::{l2_normalize, EmbeddingProvider, EMBEDDING_DIM};

#[derive(Debug, Default, Clone, Copy)]
pub struct HashedEmbeddingProvider;

impl HashedEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Bucket index and sign for a token, stable across builds and platforms.
fn bucket(token: &str) -> (usize, f32) {
    let digest = Sha256::digest(token.as_bytes());
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    let h = u64::from_le_bytes(word);
    let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
    ((h % EMBEDDING_DIM as u64) as usize, sign)
}

impl EmbeddingProvider for HashedEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (idx, sign) = bucket(&token.to_lowercase());
            v[idx] += sign;
        }
        l2_normalize(&mut v);
        Ok(v)
    }
}
