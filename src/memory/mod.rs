//! The memory store: admission rules, content addressing, similarity filtering.
//!
//! [`MemoryStore`] owns the embedding provider and the vector index for as long
//! as it lives. The daemon builds one at startup and keeps it; a fallback call
//! builds one, uses it once, and drops it.

pub mod index;

use anyhow::Context;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::MemorydConfig;
use crate::embedding::{self, EmbeddingProvider};
use index::{SqliteVecIndex, VectorIndex};

/// Minimum number of whitespace-separated words a memory must have.
pub const MIN_WORDS: usize = 3;

/// Default distance cut-off for a retrieval match (squared L2, strict `<`).
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Why a store request was refused, or that the backend failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Empty memory.")]
    EmptyInput,
    #[error("Refusing to store a question.")]
    InterrogativeInput,
    #[error("Too short to store.")]
    TooShort,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// `true` for admission rejections the caller can fix by rewording.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Backend(_))
    }
}

/// Confirmation of a successful store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub id: String,
}

/// Deterministic id for a memory: hex SHA-256 of the trimmed text.
pub fn content_id(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.trim().as_bytes()))
}

/// Apply the admission rules to already-trimmed text.
fn admit(text: &str) -> Result<(), StoreError> {
    if text.is_empty() {
        return Err(StoreError::EmptyInput);
    }
    if text.ends_with('?') {
        return Err(StoreError::InterrogativeInput);
    }
    if text.split_whitespace().count() < MIN_WORDS {
        return Err(StoreError::TooShort);
    }
    Ok(())
}

pub struct MemoryStore {
    embedder: Box<dyn EmbeddingProvider>,
    index: Box<dyn VectorIndex>,
    similarity_threshold: f64,
    default_top_k: usize,
    max_top_k: usize,
}

impl MemoryStore {
    pub fn new(
        embedder: Box<dyn EmbeddingProvider>,
        index: Box<dyn VectorIndex>,
        similarity_threshold: f64,
    ) -> Self {
        Self {
            embedder,
            index,
            similarity_threshold,
            default_top_k: 1,
            max_top_k: usize::MAX,
        }
    }

    /// Candidate count used when a request names none, and the cap that
    /// larger requests are clamped to.
    pub fn with_top_k(mut self, default_top_k: usize, max_top_k: usize) -> Self {
        self.max_top_k = max_top_k.max(1);
        self.default_top_k = default_top_k.clamp(1, self.max_top_k);
        self
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Open the configured index and load the embedding provider.
    ///
    /// This is the slow step: loading the ONNX model dominates daemon startup.
    pub fn open(config: &MemorydConfig) -> anyhow::Result<Self> {
        let db_path = config.resolved_db_path();
        let index = SqliteVecIndex::open(&db_path)
            .with_context(|| format!("failed to open vector index at {}", db_path.display()))?;
        tracing::info!(db = %db_path.display(), "vector index ready");

        let model_tag = match config.embedding.provider.as_str() {
            "local" => config.embedding.model.clone(),
            other => other.to_string(),
        };
        index.check_embedding_model(&model_tag)?;

        let embedder =
            embedding::create_provider(&config.embedding).context("failed to load embedding provider")?;
        tracing::info!(provider = %config.embedding.provider, "embedding provider ready");

        Ok(Self::new(embedder, Box::new(index), config.retrieval.similarity_threshold)
            .with_top_k(config.retrieval.default_top_k, config.retrieval.max_top_k))
    }

    /// Store `text` after trimming. Storing the same text again refreshes the
    /// existing record instead of adding a second one.
    pub fn store(&self, text: &str) -> Result<Stored, StoreError> {
        let text = text.trim();
        admit(text)?;

        let id = content_id(text);
        let embedding = self.embedder.embed(text).context("embedding failed")?;
        self.index
            .upsert(&id, text, &embedding)
            .context("index upsert failed")?;

        tracing::debug!(id = %id, "memory stored");
        Ok(Stored { id })
    }

    /// Texts of the nearest `top_k` memories whose distance is under the
    /// similarity threshold, nearest first. Empty means nothing was close enough.
    pub fn retrieve(&self, text: &str, top_k: usize) -> anyhow::Result<Vec<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![]);
        }

        let k = top_k.clamp(1, self.max_top_k);
        let embedding = self.embedder.embed(text).context("embedding failed")?;
        let neighbors = self.index.query(&embedding, k).context("index query failed")?;

        let matches: Vec<String> = neighbors
            .into_iter()
            .filter(|n| n.distance < self.similarity_threshold)
            .map(|n| n.content)
            .collect();
        tracing::debug!(k, matched = matches.len(), "retrieve finished");
        Ok(matches)
    }

    pub fn ping(&self) -> &'static str {
        "pong"
    }

    pub fn len(&self) -> anyhow::Result<usize> {
        self.index.len()
    }

    pub fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashed::HashedEmbeddingProvider;
    use index::Neighbor;
    use std::sync::{Arc, Mutex};

    /// Records calls; answers queries from a fixed candidate list.
    #[derive(Default)]
    struct RecordingIndex {
        upserts: Mutex<Vec<(String, String)>>,
        queries: Mutex<Vec<usize>>,
        candidates: Vec<Neighbor>,
    }

    impl VectorIndex for Arc<RecordingIndex> {
        fn upsert(&self, id: &str, content: &str, _embedding: &[f32]) -> anyhow::Result<()> {
            self.upserts
                .lock()
                .unwrap()
                .push((id.to_string(), content.to_string()));
            Ok(())
        }

        fn query(&self, _embedding: &[f32], k: usize) -> anyhow::Result<Vec<Neighbor>> {
            self.queries.lock().unwrap().push(k);
            Ok(self.candidates.iter().take(k).cloned().collect())
        }

        fn len(&self) -> anyhow::Result<usize> {
            Ok(self.upserts.lock().unwrap().len())
        }
    }

    fn neighbor(content: &str, distance: f64) -> Neighbor {
        Neighbor {
            id: content_id(content),
            content: content.to_string(),
            distance,
        }
    }

    fn store_with(index: RecordingIndex) -> (MemoryStore, Arc<RecordingIndex>) {
        let index = Arc::new(index);
        let store = MemoryStore::new(
            Box::new(HashedEmbeddingProvider::new()),
            Box::new(Arc::clone(&index)),
            DEFAULT_SIMILARITY_THRESHOLD,
        );
        (store, index)
    }

    #[test]
    fn content_id_is_trimmed_sha256() {
        assert_eq!(content_id("  abc \n"), content_id("abc"));
        assert_eq!(
            content_id("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_id("anything").len(), 64);
    }

    #[test]
    fn store_trims_and_upserts() {
        let (store, index) = store_with(RecordingIndex::default());
        let stored = store.store("  the cat sat on the mat \n").unwrap();

        let upserts = index.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].1, "the cat sat on the mat");
        assert_eq!(upserts[0].0, stored.id);
        assert_eq!(stored.id, content_id("the cat sat on the mat"));
    }

    #[test]
    fn same_text_twice_uses_same_id() {
        let (store, index) = store_with(RecordingIndex::default());
        let a = store.store("rust has no garbage collector").unwrap();
        let b = store.store("rust has no garbage collector ").unwrap();
        assert_eq!(a, b);
        let upserts = index.upserts.lock().unwrap();
        assert_eq!(upserts[0].0, upserts[1].0);
    }

    #[test]
    fn rejections_never_touch_the_index() {
        let (store, index) = store_with(RecordingIndex::default());

        assert!(matches!(store.store("   \t\n"), Err(StoreError::EmptyInput)));
        assert!(matches!(
            store.store("is the oven still on?"),
            Err(StoreError::InterrogativeInput)
        ));
        assert!(matches!(store.store("two words"), Err(StoreError::TooShort)));

        assert!(index.upserts.lock().unwrap().is_empty());
    }

    #[test]
    fn question_check_runs_before_length_check() {
        let (store, _) = store_with(RecordingIndex::default());
        assert!(matches!(store.store("why?"), Err(StoreError::InterrogativeInput)));
    }

    #[test]
    fn rejection_messages() {
        assert_eq!(StoreError::EmptyInput.to_string(), "Empty memory.");
        assert_eq!(
            StoreError::InterrogativeInput.to_string(),
            "Refusing to store a question."
        );
        assert_eq!(StoreError::TooShort.to_string(), "Too short to store.");
        assert!(StoreError::TooShort.is_rejection());
        assert!(!StoreError::Backend(anyhow::anyhow!("disk full")).is_rejection());
    }

    #[test]
    fn retrieve_empty_query_skips_index() {
        let (store, index) = store_with(RecordingIndex::default());
        assert!(store.retrieve("", 1).unwrap().is_empty());
        assert!(store.retrieve("   ", 3).unwrap().is_empty());
        assert!(index.queries.lock().unwrap().is_empty());
    }

    #[test]
    fn retrieve_filters_by_threshold_in_index_order() {
        let (store, _) = store_with(RecordingIndex {
            candidates: vec![
                neighbor("closest", 0.1),
                neighbor("edge", 0.8),
                neighbor("close enough", 0.79),
                neighbor("far", 1.5),
            ],
            ..Default::default()
        });
        let hits = store.retrieve("anything", 4).unwrap();
        // 0.8 is not strictly below the threshold
        assert_eq!(hits, vec!["closest", "close enough"]);
    }

    #[test]
    fn retrieve_clamps_top_k() {
        let (store, index) = store_with(RecordingIndex::default());
        let store = store.with_top_k(3, 5);
        assert_eq!(store.default_top_k(), 3);
        store.retrieve("query text", 0).unwrap();
        store.retrieve("query text", 500).unwrap();
        assert_eq!(*index.queries.lock().unwrap(), vec![1, 5]);
    }

    #[test]
    fn ping_has_no_side_effects() {
        let (store, index) = store_with(RecordingIndex::default());
        assert_eq!(store.ping(), "pong");
        assert!(index.upserts.lock().unwrap().is_empty());
        assert!(index.queries.lock().unwrap().is_empty());
    }
}
