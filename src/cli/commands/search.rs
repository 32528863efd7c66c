//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::index::DocumentId;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    document_id: &str,
    question: &str,
    top_k: Option<usize>,
    settings: Settings,
) -> Result<()> {
    let document_id = DocumentId::parse(document_id)?;
    if let Err(e) = preflight::check(Operation::Embed, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let k = top_k.unwrap_or(settings.retrieval.top_k);
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator
        .retriever()
        .retrieve(document_id.as_str(), question, k)
        .await;
    spinner.finish_and_clear();

    match results {
        Ok(chunks) if chunks.is_empty() => {
            Output::warning(&format!(
                "No passages found in {}. Is it indexed? Try 'policy-desk list'.",
                document_id
            ));
        }
        Ok(chunks) => {
            Output::success(&format!("Found {} passages", chunks.len()));
            for chunk in &chunks {
                Output::search_result(&chunk.document_id, chunk.sequence, chunk.score, &chunk.text);
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
