//! Vector store abstraction for policy-desk.
//!
//! Provides a trait-based interface for different vector database backends.
//! Entries carry a `document_id` metadata field that queries can filter on
//! exactly. Distances are cosine distances, `1 - cosine_similarity`.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::config::{Settings, VectorStoreProvider};
use crate::embedding::Embedder;
use crate::error::{PolicyError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Fixed text stored in every root marker entry.
pub const ROOT_MARKER_TEXT: &str = "INDEX_ROOT";

/// What an index entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A chunk of document text.
    Chunk,
    /// The per-document sentinel that marks the document as indexed.
    RootMarker,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Chunk => "chunk",
            EntryKind::RootMarker => "root_marker",
        }
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "chunk" => Ok(EntryKind::Chunk),
            "root_marker" => Ok(EntryKind::RootMarker),
            _ => Err(format!("Unknown entry kind: {}", s)),
        }
    }
}

/// An entry stored in the vector database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Unique entry ID. `<document_id>:<sequence>` for chunks, the document ID
    /// itself for root markers.
    pub id: String,
    /// Owning document.
    pub document_id: String,
    /// Chunk position within the document; `None` for root markers.
    pub sequence: Option<u32>,
    /// Entry kind.
    pub kind: EntryKind,
    /// Raw chunk text, or [`ROOT_MARKER_TEXT`].
    pub text: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this entry was written.
    pub indexed_at: DateTime<Utc>,
}

impl IndexEntry {
    /// Create a chunk entry.
    pub fn chunk(document_id: &str, sequence: u32, text: String, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk_entry_id(document_id, sequence),
            document_id: document_id.to_string(),
            sequence: Some(sequence),
            kind: EntryKind::Chunk,
            text,
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// Create the root marker for a document.
    pub fn root_marker(document_id: &str, embedding: Vec<f32>) -> Self {
        Self {
            id: document_id.to_string(),
            document_id: document_id.to_string(),
            sequence: None,
            kind: EntryKind::RootMarker,
            text: ROOT_MARKER_TEXT.to_string(),
            embedding,
            indexed_at: Utc::now(),
        }
    }

    pub fn is_root_marker(&self) -> bool {
        self.kind == EntryKind::RootMarker || self.text == ROOT_MARKER_TEXT
    }
}

/// Entry ID of the chunk at `sequence` in `document_id`.
pub fn chunk_entry_id(document_id: &str, sequence: u32) -> String {
    format!("{}:{}", document_id, sequence)
}

/// Allow `incoming` to replace a stored entry only within the same document.
pub(crate) fn check_owner(stored_owner: &str, incoming: &IndexEntry) -> Result<()> {
    if stored_owner == incoming.document_id {
        Ok(())
    } else {
        Err(PolicyError::EntryConflict {
            id: incoming.id.clone(),
            owner: stored_owner.to_string(),
        })
    }
}

/// The model and vector length every entry of a store was embedded with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSpace {
    pub model_id: String,
    pub dimensions: usize,
}

impl EmbeddingSpace {
    pub fn of(embedder: &dyn Embedder) -> Self {
        Self {
            model_id: embedder.model_id(),
            dimensions: embedder.dimensions(),
        }
    }

    /// Fail unless `configured` is the space this store was built with.
    pub fn ensure_matches(&self, configured: &EmbeddingSpace) -> Result<()> {
        if self == configured {
            Ok(())
        } else {
            Err(PolicyError::EmbeddingSpaceMismatch {
                stored: self.to_string(),
                configured: configured.to_string(),
            })
        }
    }
}

impl fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} dimensions)", self.model_id, self.dimensions)
    }
}

/// Exact-match metadata filter applied before ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    /// Restrict results to entries of this document.
    pub document_id: Option<String>,
}

impl MetadataFilter {
    /// Match every entry.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match entries whose `document_id` equals `document_id`.
    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
        }
    }

    pub fn matches(&self, entry: &IndexEntry) -> bool {
        self.document_id
            .as_ref()
            .map_or(true, |id| *id == entry.document_id)
    }
}

/// A query hit with its cosine distance.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    /// The matched entry.
    pub entry: IndexEntry,
    /// Cosine distance to the query (lower is closer).
    pub distance: f32,
}

/// Summary information about an indexed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Document ID.
    pub document_id: String,
    /// Number of chunk entries (root marker excluded).
    pub chunk_count: u32,
    /// Whether the root marker is present.
    pub complete: bool,
    /// When the latest entry was written.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store entries. Entries with an existing ID are replaced, unless the
    /// stored entry belongs to another document, which fails with
    /// [`PolicyError::EntryConflict`] and writes nothing.
    async fn add(&self, entries: &[IndexEntry]) -> Result<usize>;

    /// Return up to `top_n` entries passing `filter`, nearest first.
    async fn query(
        &self,
        query_embedding: &[f32],
        top_n: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryMatch>>;

    /// Fetch the entries that exist among `ids`.
    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry>>;

    /// Total number of entries, root markers included.
    async fn count(&self) -> Result<usize>;

    /// List every document with entries in the store.
    async fn list_documents(&self) -> Result<Vec<IndexedDocument>>;

    /// The embedding space recorded by the first indexing run, if any.
    async fn embedding_space(&self) -> Result<Option<EmbeddingSpace>>;

    /// Record `space` unless one is already recorded. Returns the recorded one.
    async fn claim_embedding_space(&self, space: &EmbeddingSpace) -> Result<EmbeddingSpace>;
}

/// Create the vector store selected by the settings.
pub fn create_vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match settings.vector_store.provider {
        VectorStoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
        VectorStoreProvider::Memory => Arc::new(MemoryVectorStore::new()),
    };
    Ok(store)
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank candidates by distance, then chunk order, then ID, and keep `top_n`.
///
/// A candidate whose vector length differs from the query was embedded in
/// another space and fails the whole query.
pub(crate) fn rank_matches(
    candidates: impl Iterator<Item = IndexEntry>,
    query_embedding: &[f32],
    top_n: usize,
) -> Result<Vec<QueryMatch>> {
    let mut matches = Vec::new();
    for entry in candidates {
        if entry.embedding.len() != query_embedding.len() {
            return Err(PolicyError::EmbeddingSpaceMismatch {
                stored: format!("{} dimensions in {}", entry.embedding.len(), entry.id),
                configured: format!("{} dimensions", query_embedding.len()),
            });
        }
        matches.push(QueryMatch {
            distance: cosine_distance(query_embedding, &entry.embedding),
            entry,
        });
    }

    matches.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.entry.sequence.cmp(&b.entry.sequence))
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
    matches.truncate(top_n);
    Ok(matches)
}
