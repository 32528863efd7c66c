//! RAG (Retrieval-Augmented Generation) for policy question answering.
//!
//! The [`Retriever`] finds the chunks of one document most relevant to a
//! question; the [`AnswerEngine`] hands them to a text generation service.

pub mod context;
mod response;
mod retriever;

pub use context::format_context_for_prompt;
pub use response::{AnswerEngine, AnswerResponse, OpenAIGenerator, TextGenerator};
pub use retriever::Retriever;

use serde::Serialize;

/// A chunk returned by retrieval, with its similarity to the question.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    /// Index entry ID (`<document_id>:<sequence>`).
    pub entry_id: String,
    /// Owning document.
    pub document_id: String,
    /// Chunk position in the document.
    pub sequence: Option<u32>,
    /// Chunk text.
    pub text: String,
    /// `1 - cosine_distance`; higher is more relevant.
    pub score: f32,
}
