use tracing::debug;

use super::LoadedDocument;
use crate::{RagError, Result};

/// Extract text page by page, recording where each page starts
#[inline]
pub fn extract_pages(bytes: &[u8]) -> Result<LoadedDocument> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RagError::Load(format!("Failed to extract PDF text: {e}")))?;

    debug!("Extracted {} PDF pages", pages.len());

    let mut text = String::new();
    let mut page_starts = Vec::with_capacity(pages.len());
    let mut offset = 0;
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            text.push('\n');
            offset += 1;
        }
        page_starts.push(offset);
        text.push_str(page);
        offset += page.chars().count();
    }

    Ok(LoadedDocument {
        text,
        page_starts,
        sections: Vec::new(),
    })
}
