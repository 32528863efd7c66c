//! Embedding generation for chunk indexing and question encoding.
//!
//! Chunks and questions must be embedded by the same provider and model,
//! otherwise distances between them are meaningless. Every provider returns
//! unit-length vectors so that cosine distance stays within `[0, 2]`.

mod hashing;
mod openai;

pub use hashing::HashEmbedder;
pub use openai::OpenAIEmbedder;

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Identifies the embedding space, e.g. `openai/text-embedding-3-small`.
    fn model_id(&self) -> String;
}

/// Create the embedder selected by the settings.
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::with_config(
            &settings.model,
            settings.dimensions as usize,
            settings.api_base.as_deref(),
            Duration::from_secs(settings.timeout_secs),
        )?),
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(settings.dimensions as usize)),
    };
    Ok(embedder)
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
