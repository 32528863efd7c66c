//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::index::DocumentId;
use crate::orchestrator::Orchestrator;
use crate::rag::AnswerResponse;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    document: Option<&str>,
    model: Option<&str>,
    settings: Settings,
) -> Result<()> {
    let document_id = document.map(DocumentId::parse).transpose()?;

    if let Err(e) = preflight::check(Operation::Answer, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let engine = orchestrator.answer_engine(model)?;

    let spinner = Output::spinner("Thinking...");
    let response = match &document_id {
        Some(id) => engine.ask(id.as_str(), question).await,
        None => engine.ask_general(question).await,
    };
    spinner.finish_and_clear();

    match response {
        Ok(response) => {
            print_answer(&response);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            Err(e.into())
        }
    }
}

/// Print an answer followed by the passages it used.
pub(crate) fn print_answer(response: &AnswerResponse) {
    println!("\n{}\n", response.answer);

    if !response.sources.is_empty() {
        Output::header("Sources");
        for source in &response.sources {
            Output::search_result(
                &source.document_id,
                source.sequence,
                source.score,
                &source.text,
            );
        }
    }
}
