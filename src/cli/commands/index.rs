//! Index command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;

/// Files indexed at the same time.
const MAX_CONCURRENT_FILES: usize = 4;

/// Run the index command.
pub async fn run_index(paths: &[String], settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Embed, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let manager = orchestrator.index_manager();

    let pb = Output::progress_bar(paths.len() as u64, "Indexing");

    let mut stream = stream::iter(paths.iter().map(|p| Settings::expand_path(p)))
        .map(|path: PathBuf| {
            let manager = manager.clone();
            async move {
                let result = manager.index_or_reuse(&path).await;
                (path, result)
            }
        })
        .buffer_unordered(MAX_CONCURRENT_FILES);

    let mut indexed = 0usize;
    let mut reused = 0usize;
    let mut failed = 0usize;

    while let Some((path, result)) = stream.next().await {
        pb.inc(1);
        match result {
            Ok(outcome) if outcome.reused => {
                reused += 1;
                pb.println(format!("  {} already indexed", outcome.document_id));
            }
            Ok(outcome) => {
                indexed += 1;
                let mut line = format!(
                    "  {} indexed ({} chunks from {} pages)",
                    outcome.document_id,
                    outcome.chunks_indexed,
                    outcome.pages.len()
                );
                if !outcome.skipped_pages.is_empty() {
                    line.push_str(&format!(", {} pages had no text", outcome.skipped_pages.len()));
                }
                pb.println(line);
            }
            Err(e) => {
                failed += 1;
                pb.println(format!("  {} failed: {}", path.display(), e));
            }
        }
    }

    pb.finish_and_clear();

    Output::success(&format!(
        "{} indexed, {} already indexed, {} failed",
        indexed, reused, failed
    ));

    if failed > 0 {
        return Err(anyhow::anyhow!("{} of {} files failed to index", failed, paths.len()));
    }

    Ok(())
}
