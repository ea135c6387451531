//! Persistent vector collection.
//!
//! A collection is one SQLite database `{dir}/{name}.sqlite` with a single
//! `records` table. Embeddings are stored as little-endian `f32` blobs and
//! queries are a cosine scan over the table, which is plenty for the few
//! thousand descriptions of one project.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use super::embed::Embedder;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY NOT NULL,
    document TEXT NOT NULL,
    embedding BLOB NOT NULL
);
"#;

/// One hit of a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub id: String,
    pub document: String,
    pub score: f32,
}

pub struct VectorCollection {
    name: String,
    conn: Arc<Mutex<Connection>>,
    embedder: Arc<dyn Embedder>,
}

fn collection_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.sqlite", name))
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl VectorCollection {
    /// True when the collection has been created on disk.
    pub fn exists(dir: &Path, name: &str) -> bool {
        collection_path(dir, name).is_file()
    }

    /// Open an existing collection; `None` when it was never created.
    pub async fn get(
        dir: &Path,
        name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> anyhow::Result<Option<Self>> {
        if !Self::exists(dir, name) {
            return Ok(None);
        }
        Self::get_or_create(dir, name, embedder).await.map(Some)
    }

    /// Open a collection, creating its database when missing.
    pub async fn get_or_create(
        dir: &Path,
        name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = collection_path(dir, name);
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path)
                .with_context(|| format!("Failed to open vector collection {}", path.display()))?;
            conn.execute_batch(SCHEMA)
                .context("Failed to create vector collection schema")?;
            Ok::<_, anyhow::Error>(conn)
        })
        .await??;

        Ok(Self {
            name: name.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            embedder,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn count(&self) -> anyhow::Result<usize> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok::<_, anyhow::Error>(count as usize)
        })
        .await?
    }

    /// Insert or replace documents by id.
    pub async fn upsert(&self, ids: &[String], documents: &[String]) -> anyhow::Result<()> {
        if ids.len() != documents.len() {
            anyhow::bail!(
                "upsert got {} ids for {} documents",
                ids.len(),
                documents.len()
            );
        }
        if ids.is_empty() {
            return Ok(());
        }

        let embeddings = self.embedder.embed_batch(documents).await?;
        let rows: Vec<(String, String, Vec<u8>)> = ids
            .iter()
            .zip(documents)
            .zip(&embeddings)
            .map(|((id, document), embedding)| {
                (id.clone(), document.clone(), embedding_to_blob(embedding))
            })
            .collect();

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO records (id, document, embedding) VALUES (?1, ?2, ?3)",
                )?;
                for (id, document, blob) in &rows {
                    stmt.execute(params![id, document, blob])?;
                }
            }
            tx.commit()?;
            Ok::<_, anyhow::Error>(())
        })
        .await??;

        tracing::debug!(collection = %self.name, "Upserted {} documents", ids.len());
        Ok(())
    }

    /// The `n_results` records closest to `query_text`, best first.
    pub async fn query(&self, query_text: &str, n_results: usize) -> anyhow::Result<Vec<QueryResult>> {
        let query = self.embedder.embed(query_text).await?;
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare("SELECT id, document, embedding FROM records")?;
            let mut scored = stmt
                .query_map([], |row| {
                    let blob: Vec<u8> = row.get(2)?;
                    Ok(QueryResult {
                        id: row.get(0)?,
                        document: row.get(1)?,
                        score: cosine_similarity(&query, &blob_to_embedding(&blob)),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            scored.truncate(n_results);
            Ok::<_, anyhow::Error>(scored)
        })
        .await?
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
