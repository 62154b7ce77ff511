// LanceDB vector database module
// Handles vector storage and filtered similarity search for chunk embeddings


pub mod filter;
pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::embeddings::chunking::Chunk;

pub use filter::{FILTERABLE_FIELDS, KNOWN_AGE_GROUPS, KNOWN_REGIONS, MetadataFilter, audience_filter};
pub use vector_store::VectorStore;

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Row key, equal to the chunk id
    pub id: String,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
    /// RFC 3339 insertion timestamp
    pub created_at: String,
}

/// A chunk paired with a relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Similarity in [0, 1] from the store, or a raw reranker score
    pub score: f32,
}

/// Summary of the collection backing the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collection_name: String,
    pub embedding_model: String,
    pub chunk_count: usize,
    /// Zero when nothing has been stored yet
    pub embedding_dimension: usize,
}

/// Convert a cosine distance in [0, 2] into a similarity in [0, 1]
#[inline]
pub fn similarity_from_distance(distance: f32) -> f32 {
    if distance.is_finite() {
        (1.0 - distance / 2.0).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
