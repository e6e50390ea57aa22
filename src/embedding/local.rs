//! ONNX Runtime embedding provider for all-MiniLM-L6-v2.
//!
//! Loading the session is the expensive part of daemon startup; inference per
//! call is cheap. Pipeline: tokenize, run the model, mean-pool token embeddings
//! under the attention mask, L2-normalize.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};

use super::{l2_normalize, EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

/// Maximum sequence length for all-MiniLM-L6-v2 (trained at 256).
const MAX_SEQ_LEN: usize = 256;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync and the Session is only reached through the Mutex.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

/// Paths of the model and tokenizer files inside the cache dir.
pub fn model_files(config: &EmbeddingConfig) -> (PathBuf, PathBuf) {
    let cache_dir = crate::config::expand_tilde(&config.cache_dir);
    (cache_dir.join(MODEL_FILE), cache_dir.join(TOKENIZER_FILE))
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
    tokenizer
        .with_truncation(Some(tokenizers::TruncationParams {
            max_length: MAX_SEQ_LEN,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;
    tokenizer.with_padding(Some(tokenizers::PaddingParams {
        strategy: tokenizers::PaddingStrategy::BatchLongest,
        ..Default::default()
    }));
    Ok(tokenizer)
}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_path, tokenizer_path) = model_files(config);

        for path in [&model_path, &tokenizer_path] {
            anyhow::ensure!(
                path.exists(),
                "{} not found. Run `memoryd model download` first.",
                path.display()
            );
        }

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;
        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let tokenizer = load_tokenizer(&tokenizer_path)?;
        tracing::debug!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

/// Flatten a padded batch of encodings into row-major `i64` buffers:
/// `(input_ids, attention_mask, seq_len)`.
fn flatten_batch(encodings: &[Encoding]) -> (Vec<i64>, Vec<i64>, usize) {
    let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
    let mut ids = Vec::with_capacity(encodings.len() * seq_len);
    let mut mask = Vec::with_capacity(encodings.len() * seq_len);
    for encoding in encodings {
        ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
        mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
    }
    (ids, mask, seq_len)
}

/// Masked mean over the sequence axis of a `[batch, seq, hidden]` tensor.
fn mean_pool(
    data: &[f32],
    mask: &[i64],
    batch: usize,
    seq_len: usize,
    hidden: usize,
) -> Vec<Vec<f32>> {
    (0..batch)
        .map(|b| {
            let mut sum = vec![0.0f32; hidden];
            let mut count = 0.0f32;
            for s in 0..seq_len {
                if mask[b * seq_len + s] == 0 {
                    continue;
                }
                let row = &data[(b * seq_len + s) * hidden..][..hidden];
                sum.iter_mut().zip(row).for_each(|(acc, x)| *acc += x);
                count += 1.0;
            }
            if count > 0.0 {
                sum.iter_mut().for_each(|x| *x /= count);
            }
            l2_normalize(&mut sum);
            sum
        })
        .collect()
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .context("embedding batch returned no vectors")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        let batch = encodings.len();
        let (ids, mask, seq_len) = flatten_batch(&encodings);

        let shape = vec![batch as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape.clone(), ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape.clone(), mask.clone().into_boxed_slice()))?;
        // single-segment input
        let type_ids_tensor =
            Tensor::from_array((shape, vec![0i64; batch * seq_len].into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
            "token_type_ids" => type_ids_tensor,
        })?;

        // Output naming differs between ONNX exports.
        let hidden_states = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (dims, data) = hidden_states
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings")?;
        let dims: &[i64] = &dims;
        anyhow::ensure!(
            dims.len() == 3 && dims[2] == EMBEDDING_DIM as i64,
            "unexpected token embedding shape {dims:?}, expected [batch, seq, {EMBEDDING_DIM}]"
        );
        anyhow::ensure!(
            dims[1] as usize == seq_len,
            "model returned sequence length {} for padded length {seq_len}",
            dims[1]
        );

        Ok(mean_pool(data, &mask, batch, seq_len, EMBEDDING_DIM))
    }
}
