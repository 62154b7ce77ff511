// Document loader module
// Converts supported source formats into one normalized text blob per document

#[cfg(test)]
mod tests;

pub mod docx;
pub mod html;
pub mod markdown;
pub mod pdf;
pub mod tabular;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::{RagError, Result};

/// Closed set of source formats the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Text,
    Csv,
    Html,
    Json,
    Pdf,
    Docx,
}

impl DocumentType {
    /// Map a file extension (case-insensitive, without the dot) to a type
    #[inline]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" | "md" | "markdown" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            "html" | "htm" => Some(Self::Html),
            "json" => Some(Self::Json),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Csv => "csv",
            Self::Html => "html",
            Self::Json => "json",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

impl fmt::Display for DocumentType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" | "md" | "markdown" => Ok(Self::Text),
            other => Self::from_extension(other)
                .ok_or_else(|| RagError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// A heading position inside normalized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMark {
    /// Character offset of the heading
    pub offset: usize,
    /// Heading path, e.g. "Budgeting > Emergency Fund"
    pub path: String,
}

/// Normalized text plus the structural locators recovered while loading
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedDocument {
    pub text: String,
    /// Character offset where each page starts; empty for non-paged formats
    pub page_starts: Vec<usize>,
    pub sections: Vec<SectionMark>,
}

impl LoadedDocument {
    #[inline]
    pub fn plain(text: String) -> Self {
        Self {
            text,
            page_starts: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// 1-based page number containing the character at `offset`
    #[inline]
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        if self.page_starts.is_empty() {
            return None;
        }
        let idx = self.page_starts.partition_point(|&start| start <= offset);
        u32::try_from(idx.max(1)).ok()
    }

    /// Heading path in effect at `offset`
    #[inline]
    pub fn section_at(&self, offset: usize) -> Option<&str> {
        let idx = self.sections.partition_point(|mark| mark.offset <= offset);
        idx.checked_sub(1)
            .and_then(|i| self.sections.get(i))
            .map(|mark| mark.path.as_str())
    }
}

/// Load `path` into a single normalized text string
#[inline]
pub fn load(path: &Path) -> Result<String> {
    load_document(path).map(|doc| doc.text)
}

/// Load `path`, dispatching on its extension
#[inline]
pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    if !path.exists() {
        return Err(RagError::NotFound(path.display().to_string()));
    }

    let document_type = DocumentType::from_path(path).ok_or_else(|| {
        RagError::UnsupportedFormat(
            path.extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        )
    })?;

    load_as(path, document_type)
}

/// Load `path` as the given type regardless of its extension
#[inline]
pub fn load_as(path: &Path, document_type: DocumentType) -> Result<LoadedDocument> {
    if !path.exists() {
        return Err(RagError::NotFound(path.display().to_string()));
    }

    debug!("Loading {} as {}", path.display(), document_type);

    let bytes = fs::read(path)?;
    let document = match document_type {
        DocumentType::Text => {
            let text = decode_utf8(bytes, path)?;
            if is_markdown(path) {
                let sections = markdown::section_marks(&text);
                LoadedDocument {
                    text,
                    page_starts: Vec::new(),
                    sections,
                }
            } else {
                LoadedDocument::plain(text)
            }
        }
        DocumentType::Csv => LoadedDocument::plain(tabular::render_csv(&bytes)?),
        DocumentType::Html => LoadedDocument::plain(html::extract_text(&decode_utf8(bytes, path)?)),
        DocumentType::Json => LoadedDocument::plain(pretty_json(&decode_utf8(bytes, path)?)?),
        DocumentType::Pdf => pdf::extract_pages(&bytes)?,
        DocumentType::Docx => LoadedDocument::plain(docx::extract_text(&bytes)?),
    };

    debug!(
        "Loaded {} characters from {}",
        document.text.chars().count(),
        path.display()
    );

    Ok(document)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

fn decode_utf8(bytes: Vec<u8>, path: &Path) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| RagError::Load(format!("{} is not valid UTF-8: {e}", path.display())))
}

fn pretty_json(raw: &str) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| RagError::Load(format!("Invalid JSON: {e}")))?;
    serde_json::to_string_pretty(&value)
        .map_err(|e| RagError::Load(format!("Failed to render JSON: {e}")))
}
