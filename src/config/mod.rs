//! Configuration module for policy-desk.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    AnswerSettings, ChunkingSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings,
    RetrievalSettings, Settings, VectorStoreProvider, VectorStoreSettings,
};
