//! Document indexing.
//!
//! All writes to the vector store go through [`IndexManager`]: durable library
//! files are indexed at most once, ephemeral uploads are indexed under a fresh
//! ID every time.

mod document_id;
mod manager;

pub use document_id::{DocumentId, Provenance, DURABLE_PREFIX, EPHEMERAL_PREFIX};
pub use manager::IndexManager;

use serde::Serialize;

/// Result of an indexing call.
#[derive(Debug, Clone, Serialize)]
pub struct IndexOutcome {
    /// ID to use for retrieval.
    pub document_id: DocumentId,
    /// Chunk entries written by this call.
    pub chunks_indexed: usize,
    /// Pages that contributed text. Empty when the document was reused.
    pub pages: Vec<u32>,
    /// Pages skipped during extraction.
    pub skipped_pages: Vec<u32>,
    /// True if the document was already indexed and nothing was written.
    pub reused: bool,
}

impl IndexOutcome {
    fn reused(document_id: DocumentId) -> Self {
        Self {
            document_id,
            chunks_indexed: 0,
            pages: Vec::new(),
            skipped_pages: Vec::new(),
            reused: true,
        }
    }
}
