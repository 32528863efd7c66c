//! policy-desk - Policy document question answering
//!
//! A local-first tool that indexes HR policy PDFs into a vector store and
//! answers employee questions from the passages most relevant to them.
//!
//! # Overview
//!
//! policy-desk allows you to:
//! - Index a library of policy PDFs once and reuse the index across runs
//! - Upload one-off PDFs that are indexed under a fresh temporary ID
//! - Retrieve the passages of one document that best match a question
//! - Get answers and summaries grounded in those passages
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `extract` - PDF text extraction
//! - `chunking` - Overlapping word-window chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `index` - Document IDs and the index manager
//! - `rag` - Retrieval and answer generation
//! - `orchestrator` - Component wiring
//!
//! # Example
//!
//! ```rust,no_run
//! use policy_desk::config::Settings;
//! use policy_desk::orchestrator::Orchestrator;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let outcome = orchestrator
//!         .index_manager()
//!         .index_or_reuse(Path::new("policies/leave.pdf"))
//!         .await?;
//!
//!     let passages = orchestrator
//!         .retriever()
//!         .retrieve(outcome.document_id.as_str(), "How long is parental leave?", 5)
//!         .await?;
//!     for p in passages {
//!         println!("{:.2} {}", p.score, p.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod deadline;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod vector_store;

pub use error::{PolicyError, Result};
