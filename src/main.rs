//! policy-desk CLI entry point.

use anyhow::Result;
use clap::Parser;
use policy_desk::cli::{commands, Cli, Commands};
use policy_desk::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    // -v flags win over the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("policy_desk={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Index { paths } => {
            commands::run_index(paths, settings).await?;
        }

        Commands::Upload { path, question } => {
            commands::run_upload(path, question.as_deref(), settings).await?;
        }

        Commands::Search {
            document_id,
            question,
            top_k,
        } => {
            commands::run_search(document_id, question, *top_k, settings).await?;
        }

        Commands::Ask {
            question,
            document,
            model,
        } => {
            commands::run_ask(question, document.as_deref(), model.as_deref(), settings).await?;
        }

        Commands::Summarize { document_id, model } => {
            commands::run_summarize(document_id, model.as_deref(), settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
