//! Summarize command implementation.

use super::ask::print_answer;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::index::DocumentId;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the summarize command.
pub async fn run_summarize(document_id: &str, model: Option<&str>, settings: Settings) -> Result<()> {
    let document_id = DocumentId::parse(document_id)?;
    if let Err(e) = preflight::check(Operation::Answer, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let engine = orchestrator.answer_engine(model)?;

    let spinner = Output::spinner(&format!("Summarizing {}...", document_id));
    let response = engine.summarize(document_id.as_str()).await;
    spinner.finish_and_clear();

    match response {
        Ok(response) => {
            print_answer(&response);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to summarize: {}", e));
            Err(e.into())
        }
    }
}
