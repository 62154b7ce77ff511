#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::embeddings::chunking::Metadata;
use crate::loader::DocumentType;
use crate::{RagError, Result};

/// An ingested source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub document_id: String,
    pub filename: String,
    pub document_type: DocumentType,
    pub ingested_at: DateTime<Utc>,
    pub metadata: Metadata,
    pub chunk_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSourceDocument {
    pub document_id: String,
    pub filename: String,
    pub document_type: DocumentType,
    pub metadata: Metadata,
    pub chunk_count: i64,
}

/// Raw `documents` row; metadata is stored as a JSON object
#[derive(Debug, Clone, FromRow)]
pub(crate) struct DocumentRow {
    pub document_id: String,
    pub filename: String,
    pub document_type: String,
    pub ingested_at: DateTime<Utc>,
    pub metadata: String,
    pub chunk_count: i64,
}

impl TryFrom<DocumentRow> for SourceDocument {
    type Error = RagError;

    #[inline]
    fn try_from(row: DocumentRow) -> Result<Self> {
        let document_type = row.document_type.parse()?;
        let metadata = serde_json::from_str(&row.metadata).map_err(|e| {
            RagError::Registry(format!(
                "Corrupt metadata for document {}: {e}",
                row.document_id
            ))
        })?;

        Ok(Self {
            document_id: row.document_id,
            filename: row.filename,
            document_type,
            ingested_at: row.ingested_at,
            metadata,
            chunk_count: row.chunk_count,
        })
    }
}
