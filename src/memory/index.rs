//! Durable vector index: upsert by id, k-nearest-neighbor query.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db;

/// A query candidate, nearest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub content: String,
    /// Squared L2 distance to the query embedding. `0.0` is an exact match.
    pub distance: f64,
}

/// Storage seam for the memory store.
pub trait VectorIndex: Send + Sync {
    /// Insert `id`, or refresh its text and vector if it already exists.
    fn upsert(&self, id: &str, content: &str, embedding: &[f32]) -> Result<()>;

    /// Up to `k` neighbors of `embedding`, ordered by ascending distance.
    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Number of stored records.
    fn len(&self) -> Result<usize>;
}

/// [`VectorIndex`] on SQLite + sqlite-vec.
pub struct SqliteVecIndex {
    conn: Mutex<Connection>,
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

impl SqliteVecIndex {
    /// Open the on-disk index, creating it on first use.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(db::open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::open_memory_database()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))
    }

    /// Record `model` as the embedding model behind the stored vectors.
    ///
    /// Warns when it differs from what the vectors were built with; mixing
    /// models makes distances meaningless.
    pub fn check_embedding_model(&self, model: &str) -> Result<()> {
        let conn = self.lock()?;
        match db::schema::get_meta(&conn, "embedding_model")? {
            Some(stored) if stored != model => {
                tracing::warn!(
                    stored = %stored,
                    configured = %model,
                    "embedding model changed; existing memories were embedded with a different model"
                );
            }
            Some(_) => {}
            None => db::schema::set_meta(&conn, "embedding_model", model)?,
        }
        Ok(())
    }
}

impl VectorIndex for SqliteVecIndex {
    fn upsert(&self, id: &str, content: &str, embedding: &[f32]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO memories (id, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
            params![id, content, now],
        )?;
        // vec0 has no upsert
        tx.execute("DELETE FROM memories_vec WHERE id = ?1", params![id])?;
        tx.execute(
            "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(embedding)],
        )?;

        tx.commit().context("failed to commit upsert")?;
        Ok(())
    }

    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(vec![]);
        }
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, distance FROM memories_vec \
             WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
        )?;
        let hits: Vec<(String, f64)> = stmt
            .query_map(params![embedding_to_bytes(embedding), k as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut neighbors = Vec::with_capacity(hits.len());
        for (id, l2) in hits {
            let content: Option<String> = conn
                .query_row(
                    "SELECT content FROM memories WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            match content {
                Some(content) => neighbors.push(Neighbor {
                    id,
                    content,
                    distance: l2 * l2,
                }),
                None => tracing::warn!(id = %id, "vector without a memory row, skipping"),
            }
        }
        Ok(neighbors)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}
