
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::CrossEncoder;

/// Cross-encoder served over HTTP with the text-embeddings-inference `/rerank` protocol
#[derive(Debug, Clone)]
pub struct HttpCrossEncoder {
    endpoint: Url,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

#[derive(Debug, Deserialize)]
struct RerankScore {
    index: usize,
    score: f32,
}

impl HttpCrossEncoder {
    #[inline]
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|url| url.join("/rerank"))
            .with_context(|| format!("Invalid reranker URL: {base_url}"))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Ok(Self {
            endpoint,
            model: model.to_string(),
            agent,
        })
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl CrossEncoder for HttpCrossEncoder {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Scoring {} passages with {} at {}",
            passages.len(),
            self.model,
            self.endpoint
        );

        let request = RerankRequest {
            query,
            texts: passages,
            raw_scores: true,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize rerank request")?;

        let response_text = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => {
                    anyhow::anyhow!("Reranker returned HTTP {status}")
                }
                other => anyhow::anyhow!("Request error: {other}"),
            })
            .context("Failed to score passages")?;

        let scored: Vec<RerankScore> =
            serde_json::from_str(&response_text).context("Failed to parse rerank response")?;

        let mut scores = vec![None; passages.len()];
        for entry in scored {
            let slot = scores.get_mut(entry.index).ok_or_else(|| {
                anyhow::anyhow!("Reranker returned out-of-range index {}", entry.index)
            })?;
            if slot.replace(entry.score).is_some() {
                return Err(anyhow::anyhow!(
                    "Reranker returned index {} twice",
                    entry.index
                ));
            }
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| {
                score.ok_or_else(|| anyhow::anyhow!("Reranker returned no score for passage {i}"))
            })
            .collect()
    }
}
