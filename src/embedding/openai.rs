//! OpenAI-compatible embeddings implementation.

use super::{normalize_l2, Embedder};
use crate::error::{PolicyError, Result};
use crate::openai::create_client_with;
use async_openai::error::OpenAIError;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Maximum inputs per embeddings request.
const BATCH_SIZE: usize = 100;

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create a new embedder with custom model, dimensions and endpoint.
    pub fn with_config(
        model: &str,
        dimensions: usize,
        api_base: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: create_client_with(api_base, timeout)?,
            model: model.to_string(),
            dimensions,
        })
    }

    /// Only the text-embedding-3 family accepts a `dimensions` parameter.
    fn supports_dimensions(&self) -> bool {
        self.model.starts_with("text-embedding-3")
    }
}

fn classify(e: OpenAIError) -> PolicyError {
    match e {
        OpenAIError::Reqwest(inner) => {
            PolicyError::embedding_transient(format!("embedding request failed: {}", inner))
        }
        other => PolicyError::embedding_fatal(format!("embedding API error: {}", other)),
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| PolicyError::embedding_fatal("Empty embedding response"))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let mut args = CreateEmbeddingRequestArgs::default();
            args.model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()));
            if self.supports_dimensions() {
                args.dimensions(self.dimensions as u32);
            }
            let request = args
                .build()
                .map_err(|e| PolicyError::embedding_fatal(format!("Failed to build request: {}", e)))?;

            let response = self.client.embeddings().create(request).await.map_err(classify)?;

            if response.data.len() != chunk.len() {
                return Err(PolicyError::embedding_fatal(format!(
                    "expected {} embeddings, got {}",
                    chunk.len(),
                    response.data.len()
                )));
            }

            // Sort by index to ensure correct order
            let mut embeddings: Vec<_> = response.data.into_iter().collect();
            embeddings.sort_by_key(|e| e.index);

            for embedding_data in embeddings {
                all_embeddings.push(normalize_l2(embedding_data.embedding));
            }
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> String {
        format!("openai/{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::with_config(
            "text-embedding-3-small",
            1536,
            None,
            Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(embedder.dimensions(), 1536);
        assert_eq!(embedder.model_id(), "openai/text-embedding-3-small");
        assert!(embedder.supports_dimensions());

        let embedder = OpenAIEmbedder::with_config(
            "nomic-embed-text",
            768,
            Some("http://localhost:11434/v1"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(embedder.dimensions(), 768);
        assert!(!embedder.supports_dimensions());
    }
}
