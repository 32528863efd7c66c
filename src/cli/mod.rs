//! CLI module for policy-desk.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// policy-desk - Ask questions about HR policy documents
///
/// Indexes policy PDFs into a local vector store and answers employee
/// questions from the most relevant passages.
#[derive(Parser, Debug)]
#[command(name = "policy-desk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index policy PDFs from the library (skips files already indexed)
    Index {
        /// PDF files to index
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Index a one-off PDF under a fresh temporary ID
    Upload {
        /// PDF file to upload
        path: String,

        /// Ask this question about the upload right away
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Show the passages of a document most relevant to a question
    Search {
        /// Document ID (policy:<file> or temp:<id>)
        document_id: String,

        /// The question to match against
        question: String,

        /// Number of passages to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Ask a question about a policy, or a general HR question
    Ask {
        /// The question to ask
        question: String,

        /// Document ID to answer from; omit for a general question
        #[arg(short, long)]
        document: Option<String>,

        /// LLM model to use for response generation
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Summarize a policy in five bullet points
    Summarize {
        /// Document ID to summarize
        document_id: String,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List indexed documents
    List,

    /// Start HTTP API server for the dashboard
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,
}
