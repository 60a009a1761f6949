//! SQLite-backed vector index.
//!
//! Chunks and embeddings are persisted in `<dir>/index.sqlite` and mirrored
//! in memory; search is a brute-force cosine scan over the in-memory copy.
//! The database is created lazily on the first `add`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use docqa_core::{AppError, AppResult};
use rusqlite::{params, Connection};

use crate::types::{DocumentChunk, RetrievalResult};
use crate::vector_index::{rank, EmbeddedChunk, IndexState, MetadataFilter, VectorIndex};

const DB_FILE: &str = "index.sqlite";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    filename TEXT NOT NULL,
    source_file TEXT NOT NULL,
    page INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    ingested_at TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_filename ON chunks(filename);
"#;

pub struct SqliteVectorIndex {
    dir: PathBuf,
    // rusqlite::Connection is Send but not Sync.
    conn: Mutex<Option<Connection>>,
    entries: Vec<EmbeddedChunk>,
    state: IndexState,
}

impl SqliteVectorIndex {
    /// Open the index stored in `dir`, loading any persisted chunks.
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        let db_path = dir.join(DB_FILE);

        let (conn, entries) = if db_path.exists() {
            let conn = open_connection(&db_path)?;
            let entries = load_entries(&conn)?;
            (Some(conn), entries)
        } else {
            (None, Vec::new())
        };

        let state = if entries.is_empty() {
            IndexState::Uninitialized
        } else {
            IndexState::Ready
        };

        tracing::debug!(
            "Opened vector index at {:?} ({} chunks, {:?})",
            dir,
            entries.len(),
            state
        );

        Ok(Self {
            dir,
            conn: Mutex::new(conn),
            entries,
            state,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn db_path(&self) -> PathBuf {
        self.dir.join(DB_FILE)
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn state(&self) -> IndexState {
        self.state
    }

    fn add(&mut self, entries: Vec<EmbeddedChunk>) -> AppResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let db_path = self.db_path();
        let slot = self.conn.get_mut().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            std::fs::create_dir_all(&self.dir).map_err(|e| {
                AppError::Index(format!("Failed to create index directory {:?}: {}", self.dir, e))
            })?;
            *slot = Some(open_connection(&db_path)?);
        }
        let conn = slot
            .as_mut()
            .ok_or_else(|| AppError::Index("Index connection unavailable".into()))?;

        insert_entries(conn, &entries)?;

        self.entries.extend(entries);
        self.state = IndexState::Ready;
        Ok(())
    }

    fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievalResult>> {
        if self.state == IndexState::Uninitialized {
            return Ok(Vec::new());
        }

        let results = rank(&self.entries, query_embedding, k, filter);
        tracing::debug!(
            "Retrieved {} chunks (requested top-{}, filtered: {})",
            results.len(),
            k,
            filter.is_some()
        );
        Ok(results)
    }

    fn clear(&mut self) -> AppResult<()> {
        let slot = self.conn.get_mut().unwrap_or_else(PoisonError::into_inner);

        // Delete the collection before removing files so no backend state is
        // left behind if the directory removal fails.
        if let Some(conn) = slot.take() {
            if let Err(e) = conn.execute("DELETE FROM chunks", []) {
                tracing::warn!("Failed to delete indexed chunks before reset: {}", e);
            }
        }

        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::Index(format!(
                    "Failed to remove index directory {:?}: {}",
                    self.dir, e
                )))
            }
        }

        self.entries.clear();
        self.state = IndexState::Uninitialized;
        tracing::info!("Cleared vector index at {:?}", self.dir);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn chunk_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.chunk.filename.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn storage_bytes(&self) -> u64 {
        std::fs::metadata(self.db_path()).map(|m| m.len()).unwrap_or(0)
    }
}

fn open_connection(db_path: &Path) -> AppResult<Connection> {
    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Index(format!("Failed to open SQLite index {:?}: {}", db_path, e)))?;
    conn.execute_batch(SCHEMA)
        .map_err(|e| AppError::Index(format!("Failed to create tables: {}", e)))?;
    Ok(conn)
}

fn insert_entries(conn: &mut Connection, entries: &[EmbeddedChunk]) -> AppResult<()> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::Index(format!("Failed to begin transaction: {}", e)))?;
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO chunks (id, filename, source_file, page, chunk_index, text, content_hash, ingested_at, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .map_err(|e| AppError::Index(format!("Failed to prepare insert: {}", e)))?;

        for entry in entries {
            let chunk = &entry.chunk;
            stmt.execute(params![
                chunk.id,
                chunk.filename,
                chunk.source_file,
                chunk.page as i64,
                chunk.chunk_index as i64,
                chunk.text,
                chunk.content_hash,
                chunk.ingested_at.to_rfc3339(),
                embedding_to_bytes(&entry.embedding),
            ])
            .map_err(|e| AppError::Index(format!("Failed to insert chunk: {}", e)))?;
        }
    }
    tx.commit()
        .map_err(|e| AppError::Index(format!("Failed to commit chunks: {}", e)))
}

fn load_entries(conn: &Connection) -> AppResult<Vec<EmbeddedChunk>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, filename, source_file, page, chunk_index, text, content_hash, ingested_at, embedding
             FROM chunks ORDER BY seq",
        )
        .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                DocumentChunk {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    source_file: row.get(2)?,
                    page: row.get::<_, i64>(3)? as u32,
                    chunk_index: row.get::<_, i64>(4)? as u32,
                    text: row.get(5)?,
                    content_hash: row.get(6)?,
                    ingested_at: Utc::now(),
                },
                row.get::<_, String>(7)?,
                row.get::<_, Vec<u8>>(8)?,
            ))
        })
        .map_err(|e| AppError::Index(format!("Failed to query chunks: {}", e)))?;

    let mut entries = Vec::new();
    for row in rows {
        let (mut chunk, ingested_at, bytes) =
            row.map_err(|e| AppError::Index(format!("Failed to read chunk row: {}", e)))?;
        chunk.ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AppError::Index(format!("Invalid timestamp in index: {}", e)))?;
        entries.push(EmbeddedChunk {
            chunk,
            embedding: bytes_to_embedding(&bytes)?,
        });
    }
    Ok(entries)
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index("Invalid embedding bytes length".to_string()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
