//! Context formatting for answer prompts.

use super::RetrievedChunk;

/// Format retrieved chunks as numbered excerpts for a prompt.
pub fn format_context_for_prompt(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("---\n[{}]\n{}\n---", i + 1, chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
