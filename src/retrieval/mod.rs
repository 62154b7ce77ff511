// Retrieval pipeline
// Dense vector search followed by an optional cross-encoder rerank

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::lancedb::{MetadataFilter, ScoredChunk, VectorStore};
use crate::embeddings::chunking::Metadata;
use crate::rerank::Reranker;
use crate::Result;

/// Placeholder context handed to generation when nothing was retrieved
pub const NO_CONTEXT: &str = "No relevant information found.";

/// Which stage produced a result's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    /// Cosine similarity in [0, 1]
    Similarity,
    /// Raw cross-encoder score, unbounded
    Rerank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    /// Document metadata plus `document_id` and any page/section locator
    pub metadata: Metadata,
    pub score: f32,
    pub score_kind: ScoreKind,
    pub document_id: String,
    pub chunk_id: String,
    pub page_number: Option<u32>,
    pub section: Option<String>,
}

impl RetrievalResult {
    #[inline]
    pub fn from_scored(scored: ScoredChunk, score_kind: ScoreKind) -> Self {
        let chunk = scored.chunk;

        let mut metadata = chunk.metadata;
        metadata.insert("document_id".to_string(), chunk.document_id.clone());
        if let Some(page) = chunk.page_number {
            metadata.insert("page".to_string(), page.to_string());
        }
        if let Some(section) = &chunk.section {
            metadata.insert("section".to_string(), section.clone());
        }

        Self {
            content: chunk.content,
            metadata,
            score: scored.score,
            score_kind,
            document_id: chunk.document_id,
            chunk_id: chunk.chunk_id,
            page_number: chunk.page_number,
            section: chunk.section,
        }
    }

    /// Display name of the originating document
    #[inline]
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .map_or(self.document_id.as_str(), String::as_str)
    }
}

/// Two-stage retrieval over a shared vector store
pub struct RetrievalPipeline {
    store: Arc<VectorStore>,
    reranker: Option<Reranker>,
    fallback_on_rerank_error: bool,
}

impl RetrievalPipeline {
    #[inline]
    pub fn new(store: Arc<VectorStore>, reranker: Option<Reranker>) -> Self {
        Self {
            store,
            reranker,
            fallback_on_rerank_error: false,
        }
    }

    /// Pipeline with the configured cross-encoder and degrade policy
    #[inline]
    pub fn from_config(config: &Config, store: Arc<VectorStore>) -> anyhow::Result<Self> {
        let reranker = Reranker::from_config(config)?;
        Ok(Self::new(store, Some(reranker))
            .with_fallback_on_rerank_error(config.retrieval.fallback_on_rerank_error))
    }

    /// On rerank failure, return first-stage results instead of an error
    #[inline]
    pub fn with_fallback_on_rerank_error(mut self, enabled: bool) -> Self {
        self.fallback_on_rerank_error = enabled;
        self
    }

    #[inline]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Search `top_k` candidates, then rerank down to `rerank_top_k` when requested
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        rerank_top_k: Option<usize>,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        let candidates = self.store.search(query, top_k, filter).await?;
        if candidates.is_empty() {
            debug!("No candidates for query");
            return Ok(Vec::new());
        }

        let (ranked, kind) = match rerank_top_k {
            Some(rerank_top_k) if candidates.len() > 1 => {
                self.second_stage(query, candidates, rerank_top_k).await?
            }
            _ => (candidates, ScoreKind::Similarity),
        };

        info!("Retrieved {} results ({:?} scores)", ranked.len(), kind);

        Ok(ranked
            .into_iter()
            .map(|scored| RetrievalResult::from_scored(scored, kind))
            .collect())
    }

    async fn second_stage(
        &self,
        query: &str,
        mut candidates: Vec<ScoredChunk>,
        rerank_top_k: usize,
    ) -> Result<(Vec<ScoredChunk>, ScoreKind)> {
        let Some(reranker) = &self.reranker else {
            debug!("No reranker configured, truncating first-stage results");
            candidates.truncate(rerank_top_k);
            return Ok((candidates, ScoreKind::Similarity));
        };

        if !self.fallback_on_rerank_error {
            let reranked = reranker.rerank(query, candidates, rerank_top_k).await?;
            return Ok((reranked, ScoreKind::Rerank));
        }

        match reranker.rerank(query, candidates.clone(), rerank_top_k).await {
            Ok(reranked) => Ok((reranked, ScoreKind::Rerank)),
            Err(e) => {
                warn!("Reranking failed, using first-stage results: {}", e);
                candidates.truncate(rerank_top_k);
                Ok((candidates, ScoreKind::Similarity))
            }
        }
    }
}

/// Render results as one tagged block per document for a generation prompt
#[inline]
pub fn format_context(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return NO_CONTEXT.to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let mut block = format!("[Document {}] Source: {}", i + 1, result.source());
            if let Some(page) = result.page_number {
                let _ = write!(block, " (page {page})");
            }
            let _ = write!(
                block,
                "\n{}\nRelevance score: {:.3}\n",
                result.content, result.score
            );
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}
