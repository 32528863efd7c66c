//! Error types for policy-desk.

use thiserror::Error;

/// Library-level error type for indexing and retrieval operations.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document unreadable: {0}")]
    DocumentUnreadable(String),

    #[error("Embedding generation failed: {message}")]
    Embedding { message: String, transient: bool },

    #[error("Vector store write failed: {0}")]
    StoreWrite(String),

    #[error("Vector store query failed: {0}")]
    StoreQuery(String),

    #[error("Entry {id} already belongs to {owner}")]
    EntryConflict { id: String, owner: String },

    #[error("Index was built with {stored}, but {configured} is configured")]
    EmbeddingSpaceMismatch { stored: String, configured: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("RAG error: {0}")]
    Rag(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PolicyError {
    /// A transient embedding failure (network, rate limit, 5xx).
    pub fn embedding_transient(message: impl Into<String>) -> Self {
        PolicyError::Embedding {
            message: message.into(),
            transient: true,
        }
    }

    /// A persistent embedding failure (malformed input, bad model name).
    pub fn embedding_fatal(message: impl Into<String>) -> Self {
        PolicyError::Embedding {
            message: message.into(),
            transient: false,
        }
    }

    /// Whether a caller may retry the failed operation with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            PolicyError::Embedding { transient, .. } => *transient,
            PolicyError::Timeout { .. } | PolicyError::Http(_) => true,
            PolicyError::StoreWrite(_) | PolicyError::StoreQuery(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for policy-desk operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
