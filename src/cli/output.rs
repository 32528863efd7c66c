//! CLI output formatting utilities.

use chrono::{DateTime, Local, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print one line of the document list.
    pub fn document_info(
        id: &str,
        source: &str,
        chunks: u32,
        complete: bool,
        indexed_at: &DateTime<Utc>,
    ) {
        let state = if complete {
            style("indexed").green()
        } else {
            style("incomplete").yellow()
        };
        println!(
            "  {} {} ({}, {} chunks, {}, {})",
            style("*").cyan(),
            style(id).bold(),
            source,
            chunks,
            state,
            style(indexed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")).dim()
        );
    }

    /// Print a retrieved passage.
    pub fn search_result(document_id: &str, sequence: Option<u32>, score: f32, content: &str) {
        let position = sequence.map_or_else(|| "-".to_string(), |s| format!("#{}", s));
        println!(
            "\n{} {} {} (score: {:.2})",
            style(">>").green(),
            style(document_id).bold(),
            style(position).cyan(),
            score
        );
        println!("   {}", content_preview(content, 200));
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Flatten and shorten content for one-line display.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.split_whitespace().collect::<Vec<_>>().join(" ");
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview_flattens_and_truncates() {
        assert_eq!(content_preview("a\n\nb   c", 10), "a b c");
        assert_eq!(content_preview("ééééé", 3), "ééé...");
    }
}
