// Database module
// Dual storage: SQLite for the document registry, LanceDB for chunk vectors

pub mod lancedb;
pub mod sqlite;

pub use self::lancedb::{CollectionStats, MetadataFilter, ScoredChunk, VectorStore, audience_filter};
pub use sqlite::Database;
pub use sqlite::models::{NewSourceDocument, SourceDocument};
