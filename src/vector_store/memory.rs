//! In-memory vector store implementation.
//!
//! Useful for testing and for deployments that only index ephemeral uploads.

use super::{
    check_owner, rank_matches, EmbeddingSpace, IndexEntry, IndexedDocument, MetadataFilter,
    QueryMatch, VectorStore,
};
use crate::error::{PolicyError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

/// In-memory vector store.
pub struct MemoryVectorStore {
    entries: RwLock<HashMap<String, IndexEntry>>,
    space: Mutex<Option<EmbeddingSpace>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            space: Mutex::new(None),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(&self, entries: &[IndexEntry]) -> Result<usize> {
        let mut store = self
            .entries
            .write()
            .map_err(|e| PolicyError::StoreWrite(format!("Failed to acquire lock: {}", e)))?;
        // Validate the whole batch first so a conflict writes nothing.
        for entry in entries {
            if let Some(existing) = store.get(&entry.id) {
                check_owner(&existing.document_id, entry)?;
            }
        }
        for entry in entries {
            store.insert(entry.id.clone(), entry.clone());
        }
        Ok(entries.len())
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        top_n: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryMatch>> {
        let store = self
            .entries
            .read()
            .map_err(|e| PolicyError::StoreQuery(format!("Failed to acquire lock: {}", e)))?;

        let candidates = store.values().filter(|e| filter.matches(e)).cloned();
        rank_matches(candidates, query_embedding, top_n)
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry>> {
        let store = self
            .entries
            .read()
            .map_err(|e| PolicyError::StoreQuery(format!("Failed to acquire lock: {}", e)))?;
        Ok(ids.iter().filter_map(|id| store.get(id).cloned()).collect())
    }

    async fn count(&self) -> Result<usize> {
        let store = self
            .entries
            .read()
            .map_err(|e| PolicyError::StoreQuery(format!("Failed to acquire lock: {}", e)))?;
        Ok(store.len())
    }

    async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        let store = self
            .entries
            .read()
            .map_err(|e| PolicyError::StoreQuery(format!("Failed to acquire lock: {}", e)))?;

        let mut documents: HashMap<String, IndexedDocument> = HashMap::new();

        for entry in store.values() {
            let doc = documents
                .entry(entry.document_id.clone())
                .or_insert_with(|| IndexedDocument {
                    document_id: entry.document_id.clone(),
                    chunk_count: 0,
                    complete: false,
                    indexed_at: entry.indexed_at,
                });

            if entry.is_root_marker() {
                doc.complete = true;
            } else {
                doc.chunk_count += 1;
            }
            if entry.indexed_at > doc.indexed_at {
                doc.indexed_at = entry.indexed_at;
            }
        }

        let mut documents: Vec<IndexedDocument> = documents.into_values().collect();
        documents.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));

        Ok(documents)
    }

    async fn embedding_space(&self) -> Result<Option<EmbeddingSpace>> {
        let space = self
            .space
            .lock()
            .map_err(|e| PolicyError::StoreQuery(format!("Failed to acquire lock: {}", e)))?;
        Ok(space.clone())
    }

    async fn claim_embedding_space(&self, space: &EmbeddingSpace) -> Result<EmbeddingSpace> {
        let mut recorded = self
            .space
            .lock()
            .map_err(|e| PolicyError::StoreWrite(format!("Failed to acquire lock: {}", e)))?;
        Ok(recorded.get_or_insert_with(|| space.clone()).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();

        let entries = vec![
            IndexEntry::chunk("policy:a.pdf", 0, "Hello world".to_string(), vec![1.0, 0.0, 0.0]),
            IndexEntry::chunk("policy:a.pdf", 1, "Goodbye world".to_string(), vec![0.0, 1.0, 0.0]),
            IndexEntry::chunk("policy:b.pdf", 0, "Other doc".to_string(), vec![1.0, 0.0, 0.0]),
            IndexEntry::root_marker("policy:a.pdf", vec![0.0, 0.0, 0.0]),
        ];

        store.add(&entries).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 4);

        let results = store
            .query(&[1.0, 0.0, 0.0], 10, &MetadataFilter::document("policy:a.pdf"))
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].entry.text, "Hello world");
        assert!(results[0].distance < results[1].distance);
        assert!(results.iter().all(|m| m.entry.document_id == "policy:a.pdf"));

        let found = store
            .get(&["policy:a.pdf".to_string(), "policy:b.pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_root_marker());

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        let a = docs.iter().find(|d| d.document_id == "policy:a.pdf").unwrap();
        assert_eq!(a.chunk_count, 2);
        assert!(a.complete);
        let b = docs.iter().find(|d| d.document_id == "policy:b.pdf").unwrap();
        assert!(!b.complete);
    }

    #[tokio::test]
    async fn test_add_replaces_same_id() {
        let store = MemoryVectorStore::new();
        let first = IndexEntry::chunk("d", 0, "old".to_string(), vec![1.0]);
        let second = IndexEntry::chunk("d", 0, "new".to_string(), vec![1.0]);

        store.add(&[first]).await.unwrap();
        store.add(&[second]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let got = store.get(&["d:0".to_string()]).await.unwrap();
        assert_eq!(got[0].text, "new");
    }

    #[tokio::test]
    async fn test_add_refuses_entry_of_another_document() {
        let store = MemoryVectorStore::new();
        store
            .add(&[IndexEntry::chunk("policy:x.pdf", 0, "alpha".to_string(), vec![1.0])])
            .await
            .unwrap();

        // A marker whose document id spells out the chunk id above.
        let err = store
            .add(&[
                IndexEntry::chunk("policy:y.pdf", 0, "other".to_string(), vec![1.0]),
                IndexEntry::root_marker("policy:x.pdf:0", vec![0.0]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::EntryConflict { .. }));

        assert_eq!(store.count().await.unwrap(), 1);
        let got = store.get(&["policy:x.pdf:0".to_string()]).await.unwrap();
        assert_eq!(got[0].document_id, "policy:x.pdf");
        assert_eq!(got[0].text, "alpha");
    }

    #[tokio::test]
    async fn test_first_claim_wins() {
        let store = MemoryVectorStore::new();
        assert_eq!(store.embedding_space().await.unwrap(), None);

        let first = EmbeddingSpace {
            model_id: "hash/64".to_string(),
            dimensions: 64,
        };
        let second = EmbeddingSpace {
            model_id: "hash/32".to_string(),
            dimensions: 32,
        };
        assert_eq!(store.claim_embedding_space(&first).await.unwrap(), first);
        assert_eq!(store.claim_embedding_space(&second).await.unwrap(), first);
        assert_eq!(store.embedding_space().await.unwrap(), Some(first));
    }
}
