//! Upload command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};

/// Run the upload command.
pub async fn run_upload(path: &str, question: Option<&str>, settings: Settings) -> Result<()> {
    let operation = if question.is_some() {
        Operation::Answer
    } else {
        Operation::Embed
    };
    if let Err(e) = preflight::check(operation, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = Settings::expand_path(path);
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Indexing upload...");
    let outcome = orchestrator.index_manager().index_as_new(bytes).await;
    spinner.finish_and_clear();

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            Output::error(&format!("Upload failed: {}", e));
            return Err(e.into());
        }
    };

    Output::success(&format!(
        "Uploaded as {} ({} chunks)",
        outcome.document_id, outcome.chunks_indexed
    ));
    if outcome.chunks_indexed == 0 {
        Output::warning("No text could be extracted; questions about this upload will find nothing.");
    }

    let Some(question) = question else {
        return Ok(());
    };

    let engine = orchestrator.answer_engine(None)?;
    let spinner = Output::spinner("Thinking...");
    let response = engine.ask(outcome.document_id.as_str(), question).await;
    spinner.finish_and_clear();

    match response {
        Ok(response) => {
            println!("\n{}\n", response.answer);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            Err(e.into())
        }
    }
}
