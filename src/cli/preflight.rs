//! Pre-flight checks before operations that call remote models.
//!
//! Fails fast on a missing API key instead of after a PDF has been read
//! and chunked.

use crate::config::{EmbeddingProvider, Settings};
use crate::error::{PolicyError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Indexing and search need the embedding provider.
    Embed,
    /// Answers need the embedding provider and the chat model.
    Answer,
    /// Listing only reads the store.
    Browse,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_with(operation, settings, std::env::var("OPENAI_API_KEY").ok())
}

fn check_with(operation: Operation, settings: &Settings, api_key: Option<String>) -> Result<()> {
    let embedding_needs_key = settings.embedding.provider == EmbeddingProvider::OpenAI
        && settings.embedding.api_base.is_none();
    let answer_needs_key = settings.answer.api_base.is_none();

    let needs_key = match operation {
        Operation::Embed => embedding_needs_key,
        Operation::Answer => embedding_needs_key || answer_needs_key,
        Operation::Browse => false,
    };

    if needs_key {
        check_api_key(api_key)?;
    }
    Ok(())
}

/// Check if an OpenAI API key is configured.
fn check_api_key(key: Option<String>) -> Result<()> {
    match key {
        Some(key) if !key.is_empty() => Ok(()),
        Some(_) => Err(PolicyError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(PolicyError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}
