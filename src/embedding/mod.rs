//! Text-to-vector embedding.
//!
//! [`EmbeddingProvider`] is the seam the memory store embeds through. Two
//! implementations ship: [`local::LocalEmbeddingProvider`] (ONNX Runtime,
//! all-MiniLM-L6-v2) and [`hashed::HashedEmbeddingProvider`] (feature hashing,
//! no model files). Pick one with [`create_provider`].

pub mod hashed;
pub mod local;

use anyhow::Result;

/// Number of dimensions in the embedding vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// Implementations produce L2-normalized vectors of exactly [`EMBEDDING_DIM`] dimensions.
/// All methods are synchronous; async callers go through `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// `"local"` needs the model files from `memoryd model download`; `"hashed"` needs nothing.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(local::LocalEmbeddingProvider::new(config)?)),
        "hashed" => Ok(Box::new(hashed::HashedEmbeddingProvider::new())),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local, hashed"),
    }
}

/// L2-normalize a vector in place. A zero vector is left untouched.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn create_hashed_provider() {
        let config = EmbeddingConfig {
            provider: "hashed".into(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.dimensions(), EMBEDDING_DIM);
        assert_eq!(provider.embed("hello there").unwrap().len(), EMBEDDING_DIM);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "openai".into(),
            ..Default::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider: openai"));
    }

    #[test]
    fn local_provider_without_model_files_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = EmbeddingConfig {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir: tmp.path().to_string_lossy().into_owned(),
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("memoryd model download"));
    }
}
