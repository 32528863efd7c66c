//! Extraction, chunking, embedding and storage of policy documents.

use super::{DocumentId, IndexOutcome};
use crate::chunking::{chunk_text, ChunkingConfig};
use crate::deadline::{bounded, Timeouts};
use crate::embedding::Embedder;
use crate::error::{PolicyError, Result};
use crate::extract::{extract_pdf_text, ExtractedText};
use crate::vector_store::{EmbeddingSpace, IndexEntry, VectorStore};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Indexes documents into a shared vector store.
pub struct IndexManager {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    timeouts: Timeouts,
    /// One lock per durable document ID, held across check-then-write.
    /// Entries are dropped once no caller holds or waits on them.
    locks: Mutex<HashMap<DocumentId, Arc<tokio::sync::Mutex<()>>>>,
}

impl IndexManager {
    /// Create an index manager with default chunking and timeouts.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            chunking: ChunkingConfig::default(),
            timeouts: Timeouts::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Set the chunking window.
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Set the embedding and store timeouts.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Whether the root marker of `document_id` exists.
    pub async fn is_indexed(&self, document_id: &DocumentId) -> Result<bool> {
        let found = bounded(
            "vector store lookup",
            self.timeouts.store,
            self.store.get(&[document_id.to_string()]),
        )
        .await?;
        Ok(found
            .iter()
            .any(|entry| entry.is_root_marker() && entry.document_id == document_id.as_str()))
    }

    /// Index a library file unless it is already indexed.
    ///
    /// The ID depends only on the file name, so a file whose content changes
    /// after indexing keeps serving its old chunks.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn index_or_reuse(&self, path: &Path) -> Result<IndexOutcome> {
        let document_id = DocumentId::durable(path)?;

        let lock = self.document_lock(&document_id)?;
        let outcome = {
            let _guard = lock.lock().await;
            self.index_locked(path, document_id.clone()).await
        };
        self.release_lock(&document_id, lock);
        outcome
    }

    /// Index uploaded bytes under a new ephemeral ID.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn index_as_new(&self, bytes: Vec<u8>) -> Result<IndexOutcome> {
        let document_id = DocumentId::ephemeral();
        self.write_document(document_id, bytes).await
    }

    async fn index_locked(&self, path: &Path, document_id: DocumentId) -> Result<IndexOutcome> {
        if self.is_indexed(&document_id).await? {
            info!("{} is already indexed, skipping", document_id);
            return Ok(IndexOutcome::reused(document_id));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PolicyError::DocumentUnreadable(format!("{}: {}", path.display(), e))
        })?;

        self.write_document(document_id, bytes).await
    }

    fn document_lock(&self, document_id: &DocumentId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| PolicyError::StoreWrite(format!("Failed to acquire lock table: {}", e)))?;
        Ok(locks.entry(document_id.clone()).or_default().clone())
    }

    fn release_lock(&self, document_id: &DocumentId, lock: Arc<tokio::sync::Mutex<()>>) {
        if let Ok(mut locks) = self.locks.lock() {
            drop(lock);
            // Clones are only taken under the table lock, so a count of one is final.
            if locks
                .get(document_id)
                .is_some_and(|held| Arc::strong_count(held) == 1)
            {
                locks.remove(document_id);
            }
        }
    }

    /// Record the embedder's space in the store, or fail if it differs.
    async fn claim_embedding_space(&self) -> Result<()> {
        let configured = EmbeddingSpace::of(self.embedder.as_ref());
        let recorded = bounded(
            "vector store write",
            self.timeouts.store,
            self.store.claim_embedding_space(&configured),
        )
        .await?;
        recorded.ensure_matches(&configured)
    }

    /// Extract, chunk, embed, store the chunks, then store the root marker.
    async fn write_document(&self, document_id: DocumentId, bytes: Vec<u8>) -> Result<IndexOutcome> {
        let extracted = extract_blocking(bytes).await?;
        debug!(
            "Extracted {} pages ({} skipped) from {}",
            extracted.pages.len(),
            extracted.skipped_pages.len(),
            document_id
        );

        let chunks = chunk_text(&extracted.text, &self.chunking);
        if chunks.is_empty() {
            warn!("{} has no extractable text, nothing indexed", document_id);
            return Ok(IndexOutcome {
                document_id,
                chunks_indexed: 0,
                pages: extracted.pages,
                skipped_pages: extracted.skipped_pages,
                reused: false,
            });
        }

        self.claim_embedding_space().await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = bounded(
            "embedding",
            self.timeouts.embedding,
            self.embedder.embed_batch(&texts),
        )
        .await?;

        if embeddings.len() != chunks.len() {
            return Err(PolicyError::embedding_fatal(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                IndexEntry::chunk(document_id.as_str(), chunk.sequence, chunk.text, embedding)
            })
            .collect();

        let written = bounded(
            "vector store write",
            self.timeouts.store,
            self.store.add(&entries),
        )
        .await?;

        // Written last: its presence means every chunk above is stored.
        let marker = IndexEntry::root_marker(
            document_id.as_str(),
            vec![0.0; self.embedder.dimensions()],
        );
        bounded(
            "vector store write",
            self.timeouts.store,
            self.store.add(std::slice::from_ref(&marker)),
        )
        .await?;

        info!("Indexed {} chunks for {}", written, document_id);

        Ok(IndexOutcome {
            document_id,
            chunks_indexed: written,
            pages: extracted.pages,
            skipped_pages: extracted.skipped_pages,
            reused: false,
        })
    }
}

/// PDF parsing is CPU-bound; keep it off the async workers.
async fn extract_blocking(bytes: Vec<u8>) -> Result<ExtractedText> {
    tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
        .await
        .map_err(|e| PolicyError::DocumentUnreadable(format!("extraction aborted: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::extract::fixtures::pdf_with_pages;
    use crate::rag::Retriever;
    use crate::vector_store::{IndexedDocument, MemoryVectorStore, MetadataFilter, QueryMatch};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts embedding calls and delegates to a hashing embedder.
    struct CountingEmbedder {
        inner: HashEmbedder,
        batches: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: HashEmbedder::new(64),
                batches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            // Give concurrent callers a chance to interleave.
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inner.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn model_id(&self) -> String {
            "counting".to_string()
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(PolicyError::embedding_transient("service unavailable"))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(PolicyError::embedding_transient("service unavailable"))
        }

        fn dimensions(&self) -> usize {
            8
        }

        fn model_id(&self) -> String {
            "failing".to_string()
        }
    }

    /// Rejects every write.
    struct ReadOnlyStore(MemoryVectorStore);

    #[async_trait]
    impl VectorStore for ReadOnlyStore {
        async fn add(&self, _entries: &[IndexEntry]) -> Result<usize> {
            Err(PolicyError::StoreWrite("read-only".to_string()))
        }

        async fn query(
            &self,
            query_embedding: &[f32],
            top_n: usize,
            filter: &MetadataFilter,
        ) -> Result<Vec<QueryMatch>> {
            self.0.query(query_embedding, top_n, filter).await
        }

        async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry>> {
            self.0.get(ids).await
        }

        async fn count(&self) -> Result<usize> {
            self.0.count().await
        }

        async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
            self.0.list_documents().await
        }

        async fn embedding_space(&self) -> Result<Option<EmbeddingSpace>> {
            self.0.embedding_space().await
        }

        async fn claim_embedding_space(&self, space: &EmbeddingSpace) -> Result<EmbeddingSpace> {
            self.0.claim_embedding_space(space).await
        }
    }

    fn long_text(words: usize) -> String {
        (0..words).map(|i| format!("clause{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn write_pdf(dir: &Path, name: &str, pages: &[&str]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, pdf_with_pages(pages)).unwrap();
        path
    }

    fn small_chunks() -> ChunkingConfig {
        ChunkingConfig::new(4, 1).unwrap()
    }

    #[tokio::test]
    async fn test_index_or_reuse_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "leave.pdf", &[long_text(10).as_str()]);

        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(CountingEmbedder::new());
        let manager = IndexManager::new(store.clone(), embedder.clone()).with_chunking(small_chunks());

        let first = manager.index_or_reuse(&path).await.unwrap();
        assert_eq!(first.document_id.as_str(), "policy:leave.pdf");
        assert!(!first.reused);
        assert!(first.chunks_indexed > 0);
        assert_eq!(first.pages, vec![1]);
        let count_after_first = store.count().await.unwrap();
        assert_eq!(count_after_first, first.chunks_indexed + 1);

        let second = manager.index_or_reuse(&path).await.unwrap();
        assert_eq!(second.document_id, first.document_id);
        assert!(second.reused);
        assert_eq!(store.count().await.unwrap(), count_after_first);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reuse_does_not_read_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "travel.pdf", &["Book economy class"]);

        let store = Arc::new(MemoryVectorStore::new());
        let manager = IndexManager::new(store.clone(), Arc::new(HashEmbedder::new(32)));
        manager.index_or_reuse(&path).await.unwrap();

        // Replace the file with garbage; the indexed copy keeps being used.
        std::fs::write(&path, b"not a pdf anymore").unwrap();
        let outcome = manager.index_or_reuse(&path).await.unwrap();
        assert!(outcome.reused);
    }

    #[tokio::test]
    async fn test_concurrent_durable_indexing_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), "security.pdf", &[long_text(12).as_str()]);

        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(CountingEmbedder::new());
        let manager = Arc::new(
            IndexManager::new(store.clone(), embedder.clone()).with_chunking(small_chunks()),
        );

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                let path = path.clone();
                tokio::spawn(async move { manager.index_or_reuse(&path).await })
            })
            .collect();

        let outcomes: Vec<IndexOutcome> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(outcomes.iter().filter(|o| !o.reused).count(), 1);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
        assert!(manager.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_table_is_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let manager = IndexManager::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashEmbedder::new(32)),
        );

        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            let path = write_pdf(dir.path(), name, &["Dress code applies on site"]);
            manager.index_or_reuse(&path).await.unwrap();
        }
        manager
            .index_or_reuse(&dir.path().join("absent.pdf"))
            .await
            .unwrap_err();

        assert!(manager.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_name_shaped_like_a_chunk_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(32));
        let manager = IndexManager::new(store.clone(), embedder.clone());

        let original = write_pdf(dir.path(), "x.pdf", &["alpha beta gamma delta"]);
        manager.index_or_reuse(&original).await.unwrap();
        let entries_before = store.count().await.unwrap();

        let shadow = write_pdf(dir.path(), "x.pdf:0", &["unrelated text"]);
        let err = manager.index_or_reuse(&shadow).await.unwrap_err();
        assert!(matches!(err, PolicyError::InvalidInput(_)));
        assert_eq!(store.count().await.unwrap(), entries_before);

        let hits = Retriever::new(store, embedder)
            .retrieve("policy:x.pdf", "alpha beta", 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "alpha beta gamma delta");
    }

    #[tokio::test]
    async fn test_marker_of_another_document_does_not_count() {
        let store = Arc::new(MemoryVectorStore::new());
        let manager = IndexManager::new(store.clone(), Arc::new(HashEmbedder::new(4)));

        let mut foreign = IndexEntry::root_marker("policy:other.pdf", vec![0.0; 4]);
        foreign.id = "policy:leave.pdf".to_string();
        store.add(&[foreign]).await.unwrap();

        let id = DocumentId::parse("policy:leave.pdf").unwrap();
        assert!(!manager.is_indexed(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_indexing_with_another_embedding_space_fails() {
        let store = Arc::new(MemoryVectorStore::new());
        let pdf = pdf_with_pages(&["Parental leave lasts sixteen weeks"]);

        IndexManager::new(store.clone(), Arc::new(HashEmbedder::new(64)))
            .index_as_new(pdf.clone())
            .await
            .unwrap();
        let entries_before = store.count().await.unwrap();

        let err = IndexManager::new(store.clone(), Arc::new(HashEmbedder::new(32)))
            .index_as_new(pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::EmbeddingSpaceMismatch { .. }));
        assert!(!err.is_retryable());
        assert_eq!(store.count().await.unwrap(), entries_before);
    }

    #[tokio::test]
    async fn test_missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let manager = IndexManager::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashEmbedder::new(32)),
        );

        let err = manager
            .index_or_reuse(&dir.path().join("absent.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::DocumentUnreadable(_)));
    }

    #[tokio::test]
    async fn test_garbage_upload_is_unreadable() {
        let manager = IndexManager::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashEmbedder::new(32)),
        );

        let err = manager.index_as_new(b"%PDF-garbage".to_vec()).await.unwrap_err();
        assert!(matches!(err, PolicyError::DocumentUnreadable(_)));
    }

    #[tokio::test]
    async fn test_document_without_text_writes_nothing() {
        let store = Arc::new(MemoryVectorStore::new());
        let manager = IndexManager::new(store.clone(), Arc::new(HashEmbedder::new(32)));

        let outcome = manager.index_as_new(pdf_with_pages(&["", ""])).await.unwrap();
        assert_eq!(outcome.chunks_indexed, 0);
        assert_eq!(outcome.skipped_pages, vec![1, 2]);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(!manager.is_indexed(&outcome.document_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_ephemeral_uploads_get_distinct_ids() {
        let store = Arc::new(MemoryVectorStore::new());
        let manager =
            IndexManager::new(store.clone(), Arc::new(HashEmbedder::new(32))).with_chunking(small_chunks());
        let pdf = pdf_with_pages(&[long_text(6).as_str()]);

        let a = manager.index_as_new(pdf.clone()).await.unwrap();
        let b = manager.index_as_new(pdf).await.unwrap();

        assert_ne!(a.document_id, b.document_id);
        assert_eq!(a.chunks_indexed, b.chunks_indexed);
        assert_eq!(store.count().await.unwrap(), 2 * (a.chunks_indexed + 1));
        assert!(manager.is_indexed(&a.document_id).await.unwrap());
        assert!(manager.is_indexed(&b.document_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_no_marker() {
        let store = Arc::new(MemoryVectorStore::new());
        let manager = IndexManager::new(store.clone(), Arc::new(FailingEmbedder));

        let err = manager
            .index_as_new(pdf_with_pages(&["Overtime is paid at 1.5x"]))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_write_failure_is_surfaced() {
        let store = Arc::new(ReadOnlyStore(MemoryVectorStore::new()));
        let manager = IndexManager::new(store.clone(), Arc::new(HashEmbedder::new(32)));

        let err = manager
            .index_as_new(pdf_with_pages(&["Badges must be worn"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::StoreWrite(_)));
    }

    #[tokio::test]
    async fn test_slow_embedder_times_out_without_marker() {
        struct SlowEmbedder;

        #[async_trait]
        impl Embedder for SlowEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(vec![])
            }

            async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(vec![])
            }

            fn dimensions(&self) -> usize {
                4
            }

            fn model_id(&self) -> String {
                "slow".to_string()
            }
        }

        let store = Arc::new(MemoryVectorStore::new());
        let manager = IndexManager::new(store.clone(), Arc::new(SlowEmbedder)).with_timeouts(Timeouts {
            embedding: Duration::from_millis(20),
            store: Duration::from_secs(1),
        });

        let err = manager
            .index_as_new(pdf_with_pages(&["Timesheets are due Friday"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::Timeout { .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
