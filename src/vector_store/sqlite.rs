//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine distance computed in Rust for simplicity. The
//! `document_id` filter is applied in SQL through an index, so a query only
//! scans the entries of one policy.

use super::{
    check_owner, rank_matches, EmbeddingSpace, EntryKind, IndexEntry, IndexedDocument,
    MetadataFilter, QueryMatch, VectorStore,
};
use crate::error::{PolicyError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS entries (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        sequence INTEGER,
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_entries_document_id ON entries(document_id);

    CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

const EMBEDDING_SPACE_KEY: &str = "embedding_space";

const SELECT_ENTRY: &str =
    "SELECT id, document_id, sequence, kind, content, embedding, indexed_at FROM entries";

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Connection>, String> {
        self.conn
            .lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<IndexEntry> {
        let sequence: Option<i64> = row.get(2)?;
        let kind_str: String = row.get(3)?;
        let embedding_bytes: Vec<u8> = row.get(5)?;
        let indexed_at_str: String = row.get(6)?;

        let kind = kind_str.parse::<EntryKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;

        Ok(IndexEntry {
            id: row.get(0)?,
            document_id: row.get(1)?,
            sequence: sequence.map(|s| s as u32),
            kind,
            text: row.get(4)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

fn write_err(e: impl std::fmt::Display) -> PolicyError {
    PolicyError::StoreWrite(e.to_string())
}

fn query_err(e: impl std::fmt::Display) -> PolicyError {
    PolicyError::StoreQuery(e.to_string())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn add(&self, entries: &[IndexEntry]) -> Result<usize> {
        let conn = self.lock().map_err(write_err)?;

        // All entries of one call land atomically.
        let tx = conn.unchecked_transaction().map_err(write_err)?;

        for entry in entries {
            let owner: Option<String> = tx
                .query_row(
                    "SELECT document_id FROM entries WHERE id = ?1",
                    params![entry.id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(write_err)?;
            if let Some(owner) = owner {
                check_owner(&owner, entry)?;
            }

            tx.execute(
                r#"
                INSERT OR REPLACE INTO entries
                (id, document_id, sequence, kind, content, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    entry.id,
                    entry.document_id,
                    entry.sequence.map(i64::from),
                    entry.kind.as_str(),
                    entry.text,
                    Self::embedding_to_bytes(&entry.embedding),
                    entry.indexed_at.to_rfc3339(),
                ],
            )
            .map_err(write_err)?;
        }

        tx.commit().map_err(write_err)?;
        debug!("Stored {} entries", entries.len());
        Ok(entries.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn query(
        &self,
        query_embedding: &[f32],
        top_n: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryMatch>> {
        let conn = self.lock().map_err(query_err)?;

        let entries: Vec<IndexEntry> = match &filter.document_id {
            Some(document_id) => {
                let mut stmt = conn
                    .prepare(&format!("{} WHERE document_id = ?1", SELECT_ENTRY))
                    .map_err(query_err)?;
                let rows = stmt
                    .query_map(params![document_id], Self::row_to_entry)
                    .map_err(query_err)?;
                rows.collect::<rusqlite::Result<_>>().map_err(query_err)?
            }
            None => {
                let mut stmt = conn.prepare(SELECT_ENTRY).map_err(query_err)?;
                let rows = stmt.query_map([], Self::row_to_entry).map_err(query_err)?;
                rows.collect::<rusqlite::Result<_>>().map_err(query_err)?
            }
        };

        let matches = rank_matches(entries.into_iter(), query_embedding, top_n)?;
        debug!("Found {} matching entries", matches.len());
        Ok(matches)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry>> {
        let conn = self.lock().map_err(query_err)?;

        let mut stmt = conn
            .prepare(&format!("{} WHERE id = ?1", SELECT_ENTRY))
            .map_err(query_err)?;

        let mut found = Vec::new();
        for id in ids {
            match stmt.query_row(params![id], Self::row_to_entry) {
                Ok(entry) => found.push(entry),
                Err(rusqlite::Error::QueryReturnedNoRows) => {}
                Err(e) => return Err(query_err(e)),
            }
        }
        Ok(found)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock().map_err(query_err)?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .map_err(query_err)?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        let conn = self.lock().map_err(query_err)?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT document_id,
                       SUM(CASE WHEN kind = 'chunk' THEN 1 ELSE 0 END) AS chunk_count,
                       SUM(CASE WHEN kind = 'root_marker' THEN 1 ELSE 0 END) AS markers,
                       MAX(indexed_at) AS indexed_at
                FROM entries
                GROUP BY document_id
                ORDER BY indexed_at DESC
                "#,
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| {
                let markers: i64 = row.get(2)?;
                let indexed_at_str: String = row.get(3)?;
                Ok(IndexedDocument {
                    document_id: row.get(0)?,
                    chunk_count: row.get(1)?,
                    complete: markers > 0,
                    indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .map_err(query_err)?;

        let documents: Vec<IndexedDocument> =
            rows.collect::<rusqlite::Result<_>>().map_err(query_err)?;
        Ok(documents)
    }

    async fn embedding_space(&self) -> Result<Option<EmbeddingSpace>> {
        let conn = self.lock().map_err(query_err)?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![EMBEDDING_SPACE_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;

        value
            .map(|v| serde_json::from_str(&v).map_err(query_err))
            .transpose()
    }

    #[instrument(skip(self))]
    async fn claim_embedding_space(&self, space: &EmbeddingSpace) -> Result<EmbeddingSpace> {
        let conn = self.lock().map_err(write_err)?;
        let value = serde_json::to_string(space).map_err(write_err)?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO store_meta (key, value) VALUES (?1, ?2)",
                params![EMBEDDING_SPACE_KEY, value],
            )
            .map_err(write_err)?;
        if inserted > 0 {
            info!("Recorded embedding space {}", space);
            return Ok(space.clone());
        }

        let recorded: String = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![EMBEDDING_SPACE_KEY],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        serde_json::from_str(&recorded).map_err(query_err)
    }
}
