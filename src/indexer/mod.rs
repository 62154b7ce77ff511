// Indexer module
// Ingestion orchestration: loader -> chunker -> vector store, mirrored in the registry


use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::lancedb::{CollectionStats, VectorStore};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{NewSourceDocument, SourceDocument};
use crate::embeddings::chunking::{Chunk, Chunker, Metadata};
use crate::loader::{self, DocumentType};
use crate::{RagError, Result};

const DEFAULT_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Success,
    Error,
}

/// Outcome of ingesting one source file
///
/// Failures are reported here rather than returned as errors so that a
/// directory ingest keeps going past a bad file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub status: IngestStatus,
    pub path: PathBuf,
    pub document_id: String,
    /// Chunks actually stored; non-zero on an error means partial ingestion
    pub chunks_ingested: usize,
    pub stats: Option<CollectionStats>,
    pub message: Option<String>,
}

impl IngestReport {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == IngestStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Success,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub status: DeleteStatus,
    pub document_id: String,
}

/// Events emitted while a directory is ingested
#[derive(Debug, Clone, Copy)]
pub enum DirectoryProgress<'a> {
    /// Supported files found, sent once before any ingestion
    Found(usize),
    Ingesting(&'a Path),
    Ingested(&'a IngestReport),
}

/// Feeds source documents into the vector store and document registry
pub struct Indexer {
    store: Arc<VectorStore>,
    registry: Database,
    chunker: Chunker,
    batch_size: usize,
}

impl Indexer {
    #[inline]
    pub fn new(store: Arc<VectorStore>, registry: Database, chunker: Chunker) -> Self {
        Self {
            store,
            registry,
            chunker,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Open the registry under the configured base directory and share `store`
    #[inline]
    pub async fn from_config(config: &Config, store: Arc<VectorStore>) -> Result<Self> {
        let chunker = Chunker::from_config(&config.chunking)?;
        let registry = Database::initialize_from_config(config)
            .await
            .map_err(|e| RagError::Registry(format!("{e:#}")))?;

        Ok(Self::new(store, registry, chunker)
            .with_batch_size(config.ollama.batch_size as usize))
    }

    /// Number of chunks written to the store per insert call
    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Load, chunk and store one file
    ///
    /// `document_type` overrides extension-based detection. Caller metadata
    /// may override the generated `source`, `ingestion_date`, `document_type`
    /// and `file_size` entries; `document_id` is always the generated one.
    #[inline]
    pub async fn ingest(
        &self,
        path: &Path,
        document_type: Option<DocumentType>,
        metadata: Metadata,
    ) -> IngestReport {
        let document_id = new_document_id();
        info!("Ingesting {} as {}", path.display(), document_id);

        let mut report = IngestReport {
            status: IngestStatus::Error,
            path: path.to_path_buf(),
            document_id: document_id.clone(),
            chunks_ingested: 0,
            stats: None,
            message: None,
        };

        match self
            .ingest_inner(path, document_type, metadata, &document_id, &mut report)
            .await
        {
            Ok(()) => {
                report.status = IngestStatus::Success;
                info!(
                    "Ingested {} chunks from {}",
                    report.chunks_ingested,
                    path.display()
                );
            }
            Err(e) => {
                error!("Failed to ingest {}: {}", path.display(), e);
                report.message = Some(format!("Failed to ingest document: {e}"));
            }
        }

        report
    }

    async fn ingest_inner(
        &self,
        path: &Path,
        document_type: Option<DocumentType>,
        metadata: Metadata,
        document_id: &str,
        report: &mut IngestReport,
    ) -> Result<()> {
        let document_type = match document_type {
            Some(document_type) => document_type,
            None => DocumentType::from_path(path).ok_or_else(|| {
                RagError::UnsupportedFormat(path.display().to_string())
            })?,
        };

        let owned_path = path.to_path_buf();
        let document =
            tokio::task::spawn_blocking(move || loader::load_as(&owned_path, document_type))
                .await
                .map_err(|e| RagError::Load(format!("Loader task failed: {e}")))??;

        let file_size = tokio::fs::metadata(path).await?.len();
        let filename = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        let mut full_metadata = Metadata::from([
            ("source".to_string(), filename.clone()),
            ("ingestion_date".to_string(), Utc::now().to_rfc3339()),
            ("document_type".to_string(), document_type.to_string()),
            ("file_size".to_string(), file_size.to_string()),
        ]);
        full_metadata.extend(metadata);
        full_metadata.insert("document_id".to_string(), document_id.to_string());

        let chunks = self
            .chunker
            .chunk_document(&document, &full_metadata, document_id);
        if chunks.is_empty() {
            return Err(RagError::Load(
                "No valid chunks were extracted from the document".to_string(),
            ));
        }

        let stored = self.store_batches(&chunks, report).await;

        if report.chunks_ingested > 0 {
            let registered = self
                .registry
                .register_document(NewSourceDocument {
                    document_id: document_id.to_string(),
                    filename,
                    document_type,
                    metadata: full_metadata,
                    chunk_count: i64::try_from(report.chunks_ingested).unwrap_or(i64::MAX),
                })
                .await;
            if let Err(e) = registered {
                warn!("Failed to register document {}: {:#}", document_id, e);
                stored?;
                return Err(RagError::Registry(format!("{e:#}")));
            }
        }
        stored?;

        report.stats = Some(self.store.stats().await?);
        Ok(())
    }

    /// Insert chunks batch by batch, counting what landed before any failure
    async fn store_batches(&self, chunks: &[Chunk], report: &mut IngestReport) -> Result<()> {
        for batch in chunks.chunks(self.batch_size) {
            let ids = self.store.insert(batch).await?;
            report.chunks_ingested += ids.len();
            debug!(
                "Stored batch of {} chunks ({} of {})",
                ids.len(),
                report.chunks_ingested,
                chunks.len()
            );
        }
        Ok(())
    }

    /// Ingest every supported file directly inside `dir`, in name order
    #[inline]
    pub async fn ingest_directory(&self, dir: &Path, metadata: &Metadata) -> Result<Vec<IngestReport>> {
        self.ingest_directory_with(dir, metadata, |_| {}).await
    }

    /// Like [`Indexer::ingest_directory`], reporting each step to `on_progress`
    #[inline]
    pub async fn ingest_directory_with<F>(
        &self,
        dir: &Path,
        metadata: &Metadata,
        mut on_progress: F,
    ) -> Result<Vec<IngestReport>>
    where
        F: FnMut(DirectoryProgress<'_>),
    {
        let files = supported_files(dir)?;
        info!("Ingesting {} files from {}", files.len(), dir.display());
        on_progress(DirectoryProgress::Found(files.len()));

        let mut reports = Vec::with_capacity(files.len());
        for file in &files {
            on_progress(DirectoryProgress::Ingesting(file));
            let report = self.ingest(file, None, metadata.clone()).await;
            on_progress(DirectoryProgress::Ingested(&report));
            reports.push(report);
        }
        Ok(reports)
    }

    /// Remove a document's chunks and registry entry
    #[inline]
    pub async fn delete(&self, document_id: &str) -> Result<DeleteReport> {
        let had_chunks = self.store.delete_document(document_id).await?;
        let had_record = self
            .registry
            .delete_document(document_id)
            .await
            .map_err(|e| RagError::Registry(format!("{e:#}")))?;

        let status = if had_chunks || had_record {
            info!("Deleted document {}", document_id);
            DeleteStatus::Success
        } else {
            debug!("Document {} not found", document_id);
            DeleteStatus::NotFound
        };

        Ok(DeleteReport {
            status,
            document_id: document_id.to_string(),
        })
    }

    #[inline]
    pub async fn stats(&self) -> Result<CollectionStats> {
        self.store.stats().await
    }

    /// Registered documents, newest first
    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<SourceDocument>> {
        self.registry
            .list_documents()
            .await
            .map_err(|e| RagError::Registry(format!("{e:#}")))
    }
}

/// `doc_` followed by 12 hex digits of a random UUID
#[inline]
pub fn new_document_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("doc_{}", hex.get(..12).unwrap_or(&hex))
}

/// Regular files in `dir` with a loadable extension, sorted by path
#[inline]
pub fn supported_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagError::NotFound(dir.display().to_string()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && DocumentType::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
