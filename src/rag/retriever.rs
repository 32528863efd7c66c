//! Top-k semantic retrieval restricted to one document.

use super::RetrievedChunk;
use crate::deadline::{bounded, Timeouts};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{chunk_entry_id, EmbeddingSpace, MetadataFilter, VectorStore};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Answers "which chunks of this document best match this question".
///
/// Must share its embedder with the [`IndexManager`](crate::index::IndexManager)
/// that wrote the document; vectors from different models are not comparable.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    timeouts: Timeouts,
}

impl Retriever {
    /// Create a new retriever.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            timeouts: Timeouts::default(),
        }
    }

    /// Set the embedding and store timeouts.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Fail if the store was indexed with a different embedding space.
    async fn check_embedding_space(&self) -> Result<()> {
        let recorded = bounded(
            "vector store lookup",
            self.timeouts.store,
            self.store.embedding_space(),
        )
        .await?;
        match recorded {
            Some(recorded) => recorded.ensure_matches(&EmbeddingSpace::of(self.embedder.as_ref())),
            None => Ok(()),
        }
    }

    /// Return up to `k` chunks of `document_id`, most relevant first.
    ///
    /// An unknown or empty document yields an empty list.
    #[instrument(skip(self, question))]
    pub async fn retrieve(
        &self,
        document_id: &str,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        self.check_embedding_space().await?;

        let query_embedding =
            bounded("embedding", self.timeouts.embedding, self.embedder.embed(question)).await?;

        // Over-fetch: the root marker can take a slot.
        let matches = bounded(
            "vector store query",
            self.timeouts.store,
            self.store
                .query(
                    &query_embedding,
                    k.saturating_mul(2),
                    &MetadataFilter::document(document_id),
                ),
        )
        .await?;

        let mut chunks: Vec<RetrievedChunk> = matches
            .into_iter()
            .filter(|m| !m.entry.is_root_marker())
            .map(|m| RetrievedChunk {
                score: 1.0 - m.distance,
                entry_id: m.entry.id,
                document_id: m.entry.document_id,
                sequence: m.entry.sequence,
                text: m.entry.text,
            })
            .collect();

        chunks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        chunks.truncate(k);

        debug!("Retrieved {} chunks from {}", chunks.len(), document_id);
        Ok(chunks)
    }

    /// The first `n` chunks of a document in reading order.
    pub async fn leading_chunks(&self, document_id: &str, n: u32) -> Result<Vec<RetrievedChunk>> {
        self.check_embedding_space().await?;
        let ids: Vec<String> = (0..n).map(|seq| chunk_entry_id(document_id, seq)).collect();
        let mut entries = bounded("vector store lookup", self.timeouts.store, self.store.get(&ids)).await?;
        entries.retain(|e| !e.is_root_marker() && e.document_id == document_id);
        entries.sort_by_key(|e| e.sequence);

        Ok(entries
            .into_iter()
            .map(|e| RetrievedChunk {
                entry_id: e.id,
                document_id: e.document_id,
                sequence: e.sequence,
                text: e.text,
                score: 1.0,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use crate::vector_store::{
        IndexEntry, IndexedDocument, MemoryVectorStore, QueryMatch, ROOT_MARKER_TEXT,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Returns fixed vectors for known texts.
    struct TableEmbedder(HashMap<String, Vec<f32>>);

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.0
                .get(text)
                .cloned()
                .ok_or_else(|| PolicyError::embedding_fatal(format!("unknown text {}", text)))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn model_id(&self) -> String {
            "table".to_string()
        }
    }

    fn embedder() -> Arc<dyn Embedder> {
        let mut table = HashMap::new();
        table.insert("vacation?".to_string(), vec![1.0, 0.0, 0.0]);
        table.insert("zero".to_string(), vec![0.0, 0.0, 0.0]);
        Arc::new(TableEmbedder(table))
    }

    async fn seeded_store() -> Arc<MemoryVectorStore> {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .add(&[
                IndexEntry::chunk("policy:x.pdf", 0, "A".to_string(), vec![0.9, 0.1, 0.0]),
                IndexEntry::chunk("policy:x.pdf", 1, "B".to_string(), vec![0.5, 0.5, 0.0]),
                IndexEntry::chunk("policy:x.pdf", 2, "C".to_string(), vec![0.0, 0.0, 1.0]),
                IndexEntry::root_marker("policy:x.pdf", vec![1.0, 0.0, 0.0]),
                IndexEntry::chunk("policy:y.pdf", 0, "Y0".to_string(), vec![1.0, 0.0, 0.0]),
                IndexEntry::chunk("policy:y.pdf", 1, "Y1".to_string(), vec![1.0, 0.0, 0.0]),
                IndexEntry::root_marker("policy:y.pdf", vec![0.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_relevance_ordering() {
        let retriever = Retriever::new(seeded_store().await, embedder());

        let results = retriever.retrieve("policy:x.pdf", "vacation?", 2).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
        assert!(results[0].score > results[1].score);

        let all = retriever.retrieve("policy:x.pdf", "vacation?", 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_filters_to_requested_document() {
        let retriever = Retriever::new(seeded_store().await, embedder());

        for k in 1..6 {
            let results = retriever.retrieve("policy:x.pdf", "vacation?", k).await.unwrap();
            assert!(results.iter().all(|r| r.document_id == "policy:x.pdf"));
            assert!(results.len() <= k);
        }
    }

    #[tokio::test]
    async fn test_root_marker_never_returned() {
        // The marker of x is placed exactly on the query vector.
        let retriever = Retriever::new(seeded_store().await, embedder());

        for k in 1..6 {
            for question in ["vacation?", "zero"] {
                let results = retriever.retrieve("policy:x.pdf", question, k).await.unwrap();
                assert!(results.iter().all(|r| r.text != ROOT_MARKER_TEXT));
                assert!(results.iter().all(|r| r.entry_id != "policy:x.pdf"));
            }
        }
    }

    #[tokio::test]
    async fn test_ties_break_by_sequence() {
        let retriever = Retriever::new(seeded_store().await, embedder());
        let results = retriever.retrieve("policy:y.pdf", "vacation?", 2).await.unwrap();
        let seqs: Vec<_> = results.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![Some(0), Some(1)]);
    }

    #[tokio::test]
    async fn test_unknown_document_and_zero_k() {
        let retriever = Retriever::new(seeded_store().await, embedder());
        assert!(retriever.retrieve("temp:nothing", "vacation?", 5).await.unwrap().is_empty());
        assert!(retriever.retrieve("policy:x.pdf", "vacation?", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_k_returns_every_chunk() {
        let retriever = Retriever::new(seeded_store().await, embedder());
        let results = retriever
            .retrieve("policy:x.pdf", "vacation?", usize::MAX)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_other_embedding_space_is_rejected() {
        use crate::embedding::HashEmbedder;
        use crate::extract::fixtures::pdf_with_pages;
        use crate::index::IndexManager;

        let store = Arc::new(MemoryVectorStore::new());
        let outcome = IndexManager::new(store.clone(), Arc::new(HashEmbedder::new(64)))
            .index_as_new(pdf_with_pages(&["Mileage is reimbursed monthly"]))
            .await
            .unwrap();
        let id = outcome.document_id.as_str();

        let same = Retriever::new(store.clone(), Arc::new(HashEmbedder::new(64)));
        assert_eq!(same.retrieve(id, "mileage", 3).await.unwrap().len(), 1);

        let other = Retriever::new(store, Arc::new(HashEmbedder::new(32)));
        let err = other.retrieve(id, "mileage", 3).await.unwrap_err();
        assert!(matches!(err, PolicyError::EmbeddingSpaceMismatch { .. }));
        let err = other.leading_chunks(id, 2).await.unwrap_err();
        assert!(matches!(err, PolicyError::EmbeddingSpaceMismatch { .. }));
    }

    #[tokio::test]
    async fn test_leading_chunks_in_order() {
        let retriever = Retriever::new(seeded_store().await, embedder());
        let chunks = retriever.leading_chunks("policy:x.pdf", 2).await.unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_query_failure_is_surfaced() {
        struct BrokenStore;

        #[async_trait]
        impl VectorStore for BrokenStore {
            async fn add(&self, _entries: &[IndexEntry]) -> Result<usize> {
                Ok(0)
            }

            async fn query(
                &self,
                _query_embedding: &[f32],
                _top_n: usize,
                _filter: &MetadataFilter,
            ) -> Result<Vec<QueryMatch>> {
                Err(PolicyError::StoreQuery("connection reset".to_string()))
            }

            async fn get(&self, _ids: &[String]) -> Result<Vec<IndexEntry>> {
                Ok(Vec::new())
            }

            async fn count(&self) -> Result<usize> {
                Ok(0)
            }

            async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
                Ok(Vec::new())
            }

            async fn embedding_space(&self) -> Result<Option<EmbeddingSpace>> {
                Ok(None)
            }

            async fn claim_embedding_space(
                &self,
                space: &EmbeddingSpace,
            ) -> Result<EmbeddingSpace> {
                Ok(space.clone())
            }
        }

        let retriever = Retriever::new(Arc::new(BrokenStore), embedder());
        let err = retriever.retrieve("policy:x.pdf", "vacation?", 3).await.unwrap_err();
        assert!(matches!(err, PolicyError::StoreQuery(_)));
    }
}
