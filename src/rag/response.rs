//! Answer generation from retrieved policy excerpts.

use super::context::{format_context_for_prompt, truncate_chars};
use super::{RetrievedChunk, Retriever};
use crate::config::AnswerSettings;
use crate::error::{PolicyError, Result};
use crate::openai::create_client_with;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Upper bound on document text sent for a summary.
const MAX_SUMMARY_CHARS: usize = 6000;

/// Chunks read from the start of a document for a summary.
const SUMMARY_CHUNKS: u32 = 2;

const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information in this policy for your question.";

/// An external text generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt` under `system` instructions.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Chat-completion generator for OpenAI-compatible endpoints.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    /// Create a generator from answer settings.
    pub fn from_settings(settings: &AnswerSettings) -> Result<Self> {
        Ok(Self {
            client: create_client_with(
                settings.api_base.as_deref(),
                Duration::from_secs(settings.timeout_secs),
            )?,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    /// Override the chat model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PolicyError::Rag(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PolicyError::Rag(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| PolicyError::Rag(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            PolicyError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| PolicyError::Rag("Empty response from LLM".to_string()))?;

        Ok(answer.trim().to_string())
    }
}

/// An answer with the excerpts it was based on.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    /// The generated answer.
    pub answer: String,
    /// Excerpts sent to the generator.
    pub sources: Vec<RetrievedChunk>,
}

/// Retrieval-augmented question answering over indexed policies.
pub struct AnswerEngine {
    retriever: Arc<Retriever>,
    generator: Arc<dyn TextGenerator>,
    system_prompt: String,
    top_k: usize,
}

impl AnswerEngine {
    /// Create a new answer engine.
    pub fn new(
        retriever: Arc<Retriever>,
        generator: Arc<dyn TextGenerator>,
        system_prompt: &str,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            generator,
            system_prompt: system_prompt.to_string(),
            top_k,
        }
    }

    /// Answer a question about one document.
    #[instrument(skip(self, question))]
    pub async fn ask(&self, document_id: &str, question: &str) -> Result<AnswerResponse> {
        info!("Answering question about {}", document_id);

        let sources = self
            .retriever
            .retrieve(document_id, question, self.top_k)
            .await?;

        if sources.is_empty() {
            return Ok(AnswerResponse {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources,
            });
        }

        let prompt = format!(
            "Policy excerpts:\n{}\n\nEmployee Question: {}",
            format_context_for_prompt(&sources),
            question
        );
        let answer = self.generator.generate(&self.system_prompt, &prompt).await?;

        debug!("Generated answer with {} sources", sources.len());
        Ok(AnswerResponse { answer, sources })
    }

    /// Answer a general HR question without document context.
    #[instrument(skip(self))]
    pub async fn ask_general(&self, question: &str) -> Result<AnswerResponse> {
        let answer = self.generator.generate(&self.system_prompt, question).await?;
        Ok(AnswerResponse {
            answer,
            sources: Vec::new(),
        })
    }

    /// Summarize a document in five bullet points.
    #[instrument(skip(self))]
    pub async fn summarize(&self, document_id: &str) -> Result<AnswerResponse> {
        let sources = self
            .retriever
            .leading_chunks(document_id, SUMMARY_CHUNKS)
            .await?;

        if sources.is_empty() {
            return Err(PolicyError::InvalidInput(format!(
                "{} has no indexed text to summarize",
                document_id
            )));
        }

        let text = sources
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let prompt = format!(
            "Summarize this policy in 5 bullet points:\n{}",
            truncate_chars(&text, MAX_SUMMARY_CHARS)
        );
        let answer = self.generator.generate(&self.system_prompt, &prompt).await?;

        Ok(AnswerResponse { answer, sources })
    }
}
