// Reranking module
// Second-stage scoring of (query, passage) pairs with a cross-encoder


pub mod http;
pub mod lexical;

use anyhow::Context;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, RerankerProvider};
use crate::database::lancedb::ScoredChunk;
use crate::{RagError, Result};

pub use http::HttpCrossEncoder;
pub use lexical::LexicalCrossEncoder;

/// Scores how well each passage answers a query; higher is better
pub trait CrossEncoder: Send + Sync {
    fn model_name(&self) -> &str;

    /// One score per passage, in passage order
    fn score(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>>;
}

/// Reorders candidates by cross-encoder score
#[derive(Clone)]
pub struct Reranker {
    encoder: Arc<dyn CrossEncoder>,
}

impl Reranker {
    #[inline]
    pub fn new(encoder: Arc<dyn CrossEncoder>) -> Self {
        Self { encoder }
    }

    /// Build the cross-encoder selected by `[reranker] provider`
    #[inline]
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let encoder: Arc<dyn CrossEncoder> = match config.reranker.provider {
            RerankerProvider::Http => Arc::new(
                HttpCrossEncoder::new(
                    &config.reranker.url,
                    &config.reranker.model,
                    Duration::from_secs(config.reranker.timeout_seconds),
                )
                .context("Failed to create HTTP cross-encoder")?,
            ),
            RerankerProvider::Lexical => Arc::new(LexicalCrossEncoder),
        };
        Ok(Self::new(encoder))
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.encoder.model_name()
    }

    /// Score every candidate against `query` and keep the best `top_k`
    ///
    /// Scores replace the candidates' similarity scores. Ties are broken by
    /// chunk id so the output does not depend on input order.
    #[inline]
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let encoder = Arc::clone(&self.encoder);
        let query = query.to_string();
        let passages: Vec<String> = candidates.iter().map(|c| c.chunk.content.clone()).collect();

        let scores = tokio::task::spawn_blocking(move || encoder.score(&query, &passages))
            .await
            .map_err(|e| RagError::Rerank(format!("Rerank task failed: {e}")))?
            .map_err(|e| RagError::Rerank(format!("{e:#}")))?;

        let reranked = apply_scores(candidates, &scores, top_k)?;
        debug!(
            "Reranked to {} candidates with {}",
            reranked.len(),
            self.encoder.model_name()
        );
        Ok(reranked)
    }
}

/// Attach `scores` to `candidates`, sort descending and truncate
#[inline]
pub fn apply_scores(
    candidates: Vec<ScoredChunk>,
    scores: &[f32],
    top_k: usize,
) -> Result<Vec<ScoredChunk>> {
    if scores.len() != candidates.len() {
        return Err(RagError::Rerank(format!(
            "Cross-encoder returned {} scores for {} candidates",
            scores.len(),
            candidates.len()
        )));
    }

    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(RagError::Rerank(format!(
            "Cross-encoder returned a non-finite score: {bad}"
        )));
    }

    let mut rescored: Vec<ScoredChunk> = candidates
        .into_iter()
        .zip(scores)
        .map(|(candidate, &score)| ScoredChunk { score, ..candidate })
        .collect();

    rescored.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.chunk.chunk_id.cmp(&b.chunk.chunk_id),
        other => other,
    });
    rescored.truncate(top_k);

    Ok(rescored)
}
