//! Word-window chunking for breaking extracted text into embeddable segments.
//!
//! Text is split on whitespace and cut into fixed-size windows of words that
//! overlap by a fixed number of words. The output is a pure function of the
//! text and the [`ChunkingConfig`].

use crate::config::ChunkingSettings;
use crate::error::{PolicyError, Result};
use serde::{Deserialize, Serialize};

/// A chunk of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position of this chunk in the document, starting at 0.
    pub sequence: u32,
    /// Words of the window joined by single spaces.
    pub text: String,
    /// Index of the first word (inclusive).
    pub start_word: usize,
    /// Index one past the last word.
    pub end_word: usize,
}

impl TextChunk {
    /// Number of words in this chunk.
    pub fn word_count(&self) -> usize {
        self.end_word - self.start_word
    }
}

/// Window and overlap, both in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    window_words: usize,
    overlap_words: usize,
}

impl ChunkingConfig {
    /// Create a config. The overlap must be strictly smaller than the window.
    pub fn new(window_words: usize, overlap_words: usize) -> Result<Self> {
        if window_words == 0 {
            return Err(PolicyError::InvalidInput(
                "chunk window must contain at least one word".to_string(),
            ));
        }
        if overlap_words >= window_words {
            return Err(PolicyError::InvalidInput(format!(
                "chunk overlap ({}) must be smaller than the window ({})",
                overlap_words, window_words
            )));
        }
        Ok(Self {
            window_words,
            overlap_words,
        })
    }

    pub fn window_words(&self) -> usize {
        self.window_words
    }

    pub fn overlap_words(&self) -> usize {
        self.overlap_words
    }

    /// Distance between the first words of consecutive chunks. Always > 0.
    pub fn step(&self) -> usize {
        self.window_words - self.overlap_words
    }

    /// Number of chunks produced for a text of `word_count` words.
    pub fn expected_chunks(&self, word_count: usize) -> usize {
        if word_count == 0 {
            return 0;
        }
        word_count.div_ceil(self.step())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_words: 900,
            overlap_words: 150,
        }
    }
}

impl TryFrom<&ChunkingSettings> for ChunkingConfig {
    type Error = PolicyError;

    fn try_from(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.window_words, settings.overlap_words)
    }
}

/// Split text into overlapping word windows.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::with_capacity(config.expected_chunks(words.len()));

    let mut start = 0;
    while start < words.len() {
        let end = (start + config.window_words).min(words.len());
        chunks.push(TextChunk {
            sequence: chunks.len() as u32,
            text: words[start..end].join(" "),
            start_word: start,
            end_word: end,
        });
        start += config.step();
    }

    chunks
}
