
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::{DocumentRow, NewSourceDocument, SourceDocument};

const SELECT_DOCUMENT: &str = "SELECT document_id, filename, document_type, ingested_at, metadata, chunk_count FROM documents";

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_document: NewSourceDocument) -> Result<SourceDocument> {
        let now = Utc::now();
        let metadata = serde_json::to_string(&new_document.metadata)
            .context("Failed to serialize document metadata")?;

        sqlx::query(
            "INSERT INTO documents (document_id, filename, document_type, ingested_at, metadata, chunk_count) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_document.document_id)
        .bind(&new_document.filename)
        .bind(new_document.document_type.as_str())
        .bind(now)
        .bind(metadata)
        .bind(new_document.chunk_count)
        .execute(pool)
        .await
        .context("Failed to create document")?;

        debug!("Registered document {}", new_document.document_id);

        Self::get_by_id(pool, &new_document.document_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created document"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, document_id: &str) -> Result<Option<SourceDocument>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!("{SELECT_DOCUMENT} WHERE document_id = ?"))
            .bind(document_id)
            .fetch_optional(pool)
            .await
            .context("Failed to get document by id")?;

        row.map(SourceDocument::try_from)
            .transpose()
            .context("Failed to decode document row")
    }

    /// All documents, most recently ingested first
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<SourceDocument>> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "{SELECT_DOCUMENT} ORDER BY ingested_at DESC, document_id"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        rows.into_iter()
            .map(|row| SourceDocument::try_from(row).context("Failed to decode document row"))
            .collect()
    }

    /// Returns true when a row was removed
    #[inline]
    pub async fn delete(pool: &SqlitePool, document_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE document_id = ?")
            .bind(document_id)
            .execute(pool)
            .await
            .context("Failed to delete document")?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .context("Failed to count documents")
    }
}
