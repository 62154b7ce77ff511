
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::filter::{MetadataFilter, quote};
use super::{CollectionStats, EmbeddingRecord, ScoredChunk, similarity_from_distance};
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::embeddings::chunking::{Chunk, Metadata};
use crate::{RagError, Result};

/// Metadata keys promoted to their own filterable columns
const PROMOTED_METADATA: &[&str] = &["source", "document_type", "age_group", "region", "category"];

/// Chunk embeddings plus metadata persisted in a single LanceDB table
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    embedder: Arc<dyn Embedder>,
    create_lock: Mutex<()>,
}

impl VectorStore {
    /// Open (or create) the vector database under the configured base directory
    #[inline]
    pub async fn new(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::open(
            &config.vector_database_path(),
            &config.storage.collection_name,
            embedder,
        )
        .await
    }

    #[inline]
    pub async fn open(
        db_path: &Path,
        collection_name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Store(format!("Failed to create vector database directory: {e}"))
        })?;

        let uri = db_path.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to connect to LanceDB: {e}")))?;

        info!(
            "Vector store ready (collection '{}', embedder '{}')",
            collection_name,
            embedder.model_name()
        );

        Ok(Self {
            connection,
            table_name: collection_name.to_string(),
            embedder,
            create_lock: Mutex::new(()),
        })
    }

    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed and upsert chunks keyed by chunk id, returning the stored ids
    #[inline]
    pub async fn insert(&self, chunks: &[Chunk]) -> Result<Vec<String>> {
        if chunks.is_empty() {
            debug!("No chunks to store");
            return Ok(Vec::new());
        }

        let chunks = dedup_by_id(chunks);
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embed(texts).await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Store(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
            return Err(RagError::Store(
                "Embedder returned empty or inconsistent vectors".to_string(),
            ));
        }

        let created_at = Utc::now().to_rfc3339();
        let records: Vec<EmbeddingRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord {
                id: chunk.chunk_id.clone(),
                vector,
                chunk,
                created_at: created_at.clone(),
            })
            .collect();

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let batch = create_record_batch(&records, dimension)?;

        match self.table_if_exists().await? {
            Some(table) => self.upsert(&table, batch, dimension).await?,
            None => {
                let _guard = self.create_lock.lock().await;
                match self.table_if_exists().await? {
                    Some(table) => self.upsert(&table, batch, dimension).await?,
                    None => self.create_table(batch).await?,
                }
            }
        }

        info!("Stored {} chunk embeddings", ids.len());
        Ok(ids)
    }

    /// Filtered nearest-neighbour search, best match first
    #[inline]
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let predicate = filter.map(MetadataFilter::to_predicate).transpose()?;

        if k == 0 {
            return Ok(Vec::new());
        }

        let Some(table) = self.table_if_exists().await? else {
            debug!("Collection '{}' does not exist yet", self.table_name);
            return Ok(Vec::new());
        };

        let query_vector = self
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Store("Embedder returned no query vector".to_string()))?;

        let dimension = table_dimension(&table).await?;
        if query_vector.len() != dimension {
            return Err(RagError::Store(format!(
                "Query embedding has {} dimensions but collection '{}' stores {}",
                query_vector.len(),
                self.table_name,
                dimension
            )));
        }

        debug!("Searching for {} nearest chunks", k);

        let mut vector_query = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Store(format!("Failed to create vector search: {e}")))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k);

        if let Some(predicate) = predicate.filter(|p| p != "TRUE") {
            vector_query = vector_query.only_if(predicate);
        }

        let mut stream = vector_query
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to execute search: {e}")))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Store(format!("Failed to read result stream: {e}")))?
        {
            results.extend(parse_search_batch(&batch)?);
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);

        debug!("Vector search returned {} chunks", results.len());
        Ok(results)
    }

    /// Remove every chunk of a document; false when none existed
    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let Some(table) = self.table_if_exists().await? else {
            return Ok(false);
        };

        let predicate = format!("document_id = {}", quote(document_id));
        let matching = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| RagError::Store(format!("Failed to count document chunks: {e}")))?;

        if matching == 0 {
            debug!("No chunks stored for document {}", document_id);
            return Ok(false);
        }

        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Store(format!("Failed to delete document chunks: {e}")))?;

        info!("Deleted {} chunks for document {}", matching, document_id);
        Ok(true)
    }

    /// Number of stored chunks
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        match self.table_if_exists().await? {
            Some(table) => table
                .count_rows(None)
                .await
                .map_err(|e| RagError::Store(format!("Failed to count rows: {e}"))),
            None => Ok(0),
        }
    }

    #[inline]
    pub async fn stats(&self) -> Result<CollectionStats> {
        let (chunk_count, embedding_dimension) = match self.table_if_exists().await? {
            Some(table) => {
                let count = table
                    .count_rows(None)
                    .await
                    .map_err(|e| RagError::Store(format!("Failed to count rows: {e}")))?;
                let dimension = if count == 0 {
                    0
                } else {
                    table_dimension(&table).await?
                };
                (count, dimension)
            }
            None => (0, 0),
        };

        Ok(CollectionStats {
            collection_name: self.table_name.clone(),
            embedding_model: self.embedder.model_name().to_string(),
            chunk_count,
            embedding_dimension,
        })
    }

    /// Look up the backing table without creating it
    async fn table_if_exists(&self) -> Result<Option<Table>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to list tables: {e}")))?;

        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map(Some)
            .map_err(|e| RagError::Store(format!("Failed to open table: {e}")))
    }

    async fn create_table(&self, batch: RecordBatch) -> Result<()> {
        info!("Creating collection '{}'", self.table_name);

        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        self.connection
            .create_table(&self.table_name, reader)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to create table: {e}")))?;

        Ok(())
    }

    async fn upsert(&self, table: &Table, batch: RecordBatch, dimension: usize) -> Result<()> {
        let existing = table_dimension(table).await?;
        if existing != dimension {
            return Err(RagError::Store(format!(
                "Embedding dimension {dimension} does not match collection dimension {existing}"
            )));
        }

        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::Store(format!("Failed to upsert embeddings: {e}")))?;

        Ok(())
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed(&texts))
            .await
            .map_err(|e| RagError::Store(format!("Embedding task failed: {e}")))?
            .map_err(|e| RagError::Store(format!("Failed to embed text: {e:#}")))
    }
}

/// Keep the last chunk for each id, at the position of its first occurrence
fn dedup_by_id(chunks: &[Chunk]) -> Vec<Chunk> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        if let Some(&pos) = positions.get(chunk.chunk_id.as_str()) {
            unique[pos] = chunk.clone();
        } else {
            positions.insert(&chunk.chunk_id, unique.len());
            unique.push(chunk.clone());
        }
    }

    unique
}

async fn table_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::Store(format!("Failed to get table schema: {e}")))?;

    schema
        .fields()
        .iter()
        .find(|field| field.name() == "vector")
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .ok_or_else(|| RagError::Store("Could not determine vector dimension".to_string()))
}

fn create_schema(dimension: usize) -> Result<Arc<Schema>> {
    let list_size = i32::try_from(dimension)
        .map_err(|_| RagError::Store(format!("Vector dimension {dimension} is too large")))?;

    let mut fields = vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                list_size,
            ),
            false,
        ),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("start_offset", DataType::UInt64, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, true),
        Field::new("section", DataType::Utf8, true),
    ];
    fields.extend(
        PROMOTED_METADATA
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true)),
    );
    fields.push(Field::new("metadata", DataType::Utf8, false));
    fields.push(Field::new("created_at", DataType::Utf8, false));

    Ok(Arc::new(Schema::new(fields)))
}

fn create_record_batch(records: &[EmbeddingRecord], dimension: usize) -> Result<RecordBatch> {
    let schema = create_schema(dimension)?;
    let list_size = i32::try_from(dimension)
        .map_err(|_| RagError::Store(format!("Vector dimension {dimension} is too large")))?;

    let mut flat_values = Vec::with_capacity(records.len() * dimension);
    for record in records {
        flat_values.extend_from_slice(&record.vector);
    }
    let item_field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        item_field,
        list_size,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Store(format!("Failed to create vector array: {e}")))?;

    let metadata_json = records
        .iter()
        .map(|r| serde_json::to_string(&r.chunk.metadata))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| RagError::Store(format!("Failed to serialize chunk metadata: {e}")))?;

    let mut arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()))),
        Arc::new(vector_array),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.chunk.document_id.as_str()),
        )),
        Arc::new(UInt32Array::from_iter_values(
            records.iter().map(|r| r.chunk.chunk_index),
        )),
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.chunk.start_offset as u64),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.chunk.content.as_str()),
        )),
        Arc::new(UInt32Array::from(
            records
                .iter()
                .map(|r| r.chunk.page_number)
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records
                .iter()
                .map(|r| r.chunk.section.as_deref())
                .collect::<Vec<_>>(),
        )),
    ];
    for key in PROMOTED_METADATA {
        arrays.push(Arc::new(StringArray::from(
            records
                .iter()
                .map(|r| r.chunk.metadata.get(*key).map(String::as_str))
                .collect::<Vec<_>>(),
        )));
    }
    arrays.push(Arc::new(StringArray::from(metadata_json)));
    arrays.push(Arc::new(StringArray::from_iter_values(
        records.iter().map(|r| r.created_at.as_str()),
    )));

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| RagError::Store(format!("Failed to create record batch: {e}")))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Store(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Store(format!("Invalid {name} column type")))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Store(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Store(format!("Invalid {name} column type")))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
    let ids = string_column(batch, "id")?;
    let document_ids = string_column(batch, "document_id")?;
    let contents = string_column(batch, "content")?;
    let sections = string_column(batch, "section")?;
    let metadata = string_column(batch, "metadata")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;
    let pages = u32_column(batch, "page")?;
    let start_offsets = batch
        .column_by_name("start_offset")
        .and_then(|col| col.as_any().downcast_ref::<UInt64Array>())
        .ok_or_else(|| RagError::Store("Missing start_offset column".to_string()))?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    (0..batch.num_rows())
        .map(|row| {
            let chunk_metadata: Metadata = serde_json::from_str(metadata.value(row))
                .map_err(|e| RagError::Store(format!("Corrupt chunk metadata: {e}")))?;

            let distance = distances.map_or(f32::NAN, |d| {
                if d.is_null(row) { f32::NAN } else { d.value(row) }
            });

            Ok(ScoredChunk {
                chunk: Chunk {
                    chunk_id: ids.value(row).to_string(),
                    document_id: document_ids.value(row).to_string(),
                    chunk_index: chunk_indices.value(row),
                    content: contents.value(row).to_string(),
                    start_offset: usize::try_from(start_offsets.value(row)).unwrap_or(usize::MAX),
                    page_number: (!pages.is_null(row)).then(|| pages.value(row)),
                    section: (!sections.is_null(row)).then(|| sections.value(row).to_string()),
                    metadata: chunk_metadata,
                },
                score: similarity_from_distance(distance),
            })
        })
        .collect()
}
