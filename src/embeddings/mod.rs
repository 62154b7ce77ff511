// Embeddings module
// Text-to-vector seam plus the chunker that feeds it

pub mod chunking;
pub mod hashing;
pub mod ollama;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::{Config, EmbeddingProvider};

pub use chunking::{Chunk, Chunker, ChunkingConfig, Metadata, chunk_id};
pub use hashing::HashEmbedder;
pub use ollama::OllamaClient;

/// Deterministic text to fixed-dimension vector function
///
/// Implementations are synchronous; async callers run them on a blocking thread.
pub trait Embedder: Send + Sync {
    /// Identifier reported in collection stats
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, one vector per input in input order
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string
    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .context("Embedder returned no vector for query")
    }
}

/// Construct the embedder selected by `[embedding] provider`
#[inline]
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    Ok(match config.embedding.provider {
        EmbeddingProvider::Ollama => Arc::new(
            OllamaClient::new(&config.ollama).context("Failed to create Ollama embedder")?,
        ),
        EmbeddingProvider::Hash => {
            Arc::new(HashEmbedder::new(config.embedding.hash_dimension as usize))
        }
    })
}
