//! Component wiring for policy-desk.
//!
//! Builds one embedder and one vector store from the settings and shares them
//! between the index manager and the retriever, so queries are always embedded
//! with the model that indexed the documents.

use crate::chunking::ChunkingConfig;
use crate::config::Settings;
use crate::deadline::Timeouts;
use crate::embedding::{create_embedder, Embedder};
use crate::error::Result;
use crate::index::IndexManager;
use crate::rag::{AnswerEngine, OpenAIGenerator, Retriever, TextGenerator};
use crate::vector_store::{create_vector_store, VectorStore};
use std::sync::Arc;
use tracing::{debug, info};

/// The main orchestrator for policy-desk.
pub struct Orchestrator {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    index_manager: Arc<IndexManager>,
    retriever: Arc<Retriever>,
}

impl Orchestrator {
    /// Create an orchestrator with the components selected by `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        let embedder = create_embedder(&settings.embedding)?;
        let vector_store = create_vector_store(&settings)?;
        info!(
            "Using {} embeddings ({}) with {} store",
            settings.embedding.provider,
            embedder.model_id(),
            settings.vector_store.provider
        );
        Self::with_components(settings, embedder, vector_store)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let chunking = ChunkingConfig::try_from(&settings.chunking)?;
        let timeouts = Timeouts::from(&settings);
        debug!(
            "Chunking {} word windows with {} words of overlap",
            chunking.window_words(),
            chunking.overlap_words()
        );

        let index_manager = Arc::new(
            IndexManager::new(vector_store.clone(), embedder.clone())
                .with_chunking(chunking)
                .with_timeouts(timeouts),
        );
        let retriever = Arc::new(
            Retriever::new(vector_store.clone(), embedder.clone()).with_timeouts(timeouts),
        );

        Ok(Self {
            settings,
            embedder,
            vector_store,
            index_manager,
            retriever,
        })
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a reference to the embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    pub fn index_manager(&self) -> Arc<IndexManager> {
        self.index_manager.clone()
    }

    pub fn retriever(&self) -> Arc<Retriever> {
        self.retriever.clone()
    }

    /// Build an answer engine backed by the configured chat model.
    ///
    /// `model` overrides `answer.model` for this engine only.
    pub fn answer_engine(&self, model: Option<&str>) -> Result<AnswerEngine> {
        let mut generator = OpenAIGenerator::from_settings(&self.settings.answer)?;
        if let Some(model) = model {
            generator = generator.with_model(model);
        }
        Ok(self.answer_engine_with(Arc::new(generator)))
    }

    /// Build an answer engine around a custom generator.
    pub fn answer_engine_with(&self, generator: Arc<dyn TextGenerator>) -> AnswerEngine {
        AnswerEngine::new(
            self.retriever.clone(),
            generator,
            &self.settings.answer.system_prompt,
            self.settings.retrieval.top_k,
        )
    }
}
