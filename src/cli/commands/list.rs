//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::index::{DocumentId, Provenance};
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.vector_store().list_documents().await {
        Ok(documents) => {
            if documents.is_empty() {
                Output::info("No policies indexed yet. Use 'policy-desk index <file.pdf>' to add one.");
            } else {
                Output::header(&format!("Indexed Documents ({})", documents.len()));
                println!();

                for doc in &documents {
                    let source = match DocumentId::parse(&doc.document_id).map(|id| id.provenance()) {
                        Ok(Provenance::Durable) => "library",
                        Ok(Provenance::Ephemeral) => "upload",
                        Err(_) => "unknown",
                    };
                    Output::document_info(
                        &doc.document_id,
                        source,
                        doc.chunk_count,
                        doc.complete,
                        &doc.indexed_at,
                    );
                }

                let total_chunks: u32 = documents.iter().map(|d| d.chunk_count).sum();
                let total_entries = orchestrator.vector_store().count().await?;
                println!();
                Output::kv("Total documents", &documents.len().to_string());
                Output::kv("Total chunks", &total_chunks.to_string());
                Output::kv("Stored entries", &total_entries.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list documents: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
