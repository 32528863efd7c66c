//! PDF text extraction.
//!
//! Extraction is best-effort per page: a page that fails to decode or yields
//! only whitespace is skipped and recorded, never fatal. Only bytes that do not
//! parse as a PDF at all are an error.

use crate::error::{PolicyError, Result};
use lopdf::Document;
use tracing::{debug, warn};

/// Separator placed between the text of consecutive pages.
const PAGE_SEPARATOR: &str = "\n\n";

/// Text extracted from a PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    /// Text of every contributing page, joined by a blank line.
    pub text: String,
    /// 1-based numbers of the pages that contributed text, in document order.
    pub pages: Vec<u32>,
    /// 1-based numbers of the pages that failed or were empty.
    pub skipped_pages: Vec<u32>,
}

impl ExtractedText {
    /// Total number of pages seen.
    pub fn page_count(&self) -> usize {
        self.pages.len() + self.skipped_pages.len()
    }

    /// True if no page produced any text.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Extract plain text from raw PDF bytes.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<ExtractedText> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| PolicyError::DocumentUnreadable(format!("not a readable PDF: {}", e)))?;

    let mut texts = Vec::new();
    let mut extracted = ExtractedText::default();

    // get_pages is keyed by 1-based page number and iterates in order
    for page_number in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => {
                texts.push(text);
                extracted.pages.push(page_number);
            }
            Ok(_) => {
                debug!("Page {} has no extractable text", page_number);
                extracted.skipped_pages.push(page_number);
            }
            Err(e) => {
                debug!("Skipping page {}: {}", page_number, e);
                extracted.skipped_pages.push(page_number);
            }
        }
    }

    let total = extracted.page_count();
    if total > 0 && extracted.skipped_pages.len() * 2 > total {
        warn!(
            "Extracted text from only {} of {} pages",
            extracted.pages.len(),
            total
        );
    }

    extracted.text = texts.join(PAGE_SEPARATOR);
    Ok(extracted)
}
