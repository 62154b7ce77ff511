
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::database::lancedb::{MetadataFilter, VectorStore, audience_filter};
use crate::embeddings::build_embedder;
use crate::embeddings::chunking::Metadata;
use crate::generation::{OllamaGenerator, build_prompt, generate_answer};
use crate::indexer::{DeleteStatus, DirectoryProgress, IngestReport, Indexer};
use crate::loader::DocumentType;
use crate::retrieval::{RetrievalPipeline, RetrievalResult, ScoreKind, format_context};

/// Query-time knobs shared by `search` and `ask`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub top_k: Option<usize>,
    pub rerank_top_k: Option<usize>,
    pub no_rerank: bool,
    pub age_group: Option<String>,
    pub region: Option<String>,
}

impl QueryOptions {
    fn filter(&self) -> Option<MetadataFilter> {
        audience_filter(self.age_group.as_deref(), self.region.as_deref())
    }

    /// Effective `(top_k, rerank_top_k)` after applying configured defaults
    #[inline]
    pub fn limits(&self, config: &Config) -> (usize, Option<usize>) {
        let top_k = self.top_k.unwrap_or(config.retrieval.top_k);
        let rerank_top_k = if self.no_rerank {
            None
        } else {
            Some(
                self.rerank_top_k
                    .unwrap_or(config.retrieval.rerank_top_k)
                    .min(top_k),
            )
        };
        (top_k, rerank_top_k)
    }
}

/// Build document metadata from the audience flags plus `key=value` pairs
#[inline]
pub fn parse_metadata(
    age_group: Option<&str>,
    region: Option<&str>,
    category: Option<&str>,
    pairs: &[String],
) -> Result<Metadata> {
    let mut metadata = Metadata::new();

    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Metadata must be key=value, got '{pair}'"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Metadata key is empty in '{pair}'");
        }
        metadata.insert(key.to_string(), value.trim().to_string());
    }

    let region = region.map(str::to_lowercase);
    for (key, value) in [
        ("age_group", age_group),
        ("region", region.as_deref()),
        ("category", category),
    ] {
        if let Some(value) = value {
            metadata.insert(key.to_string(), value.to_string());
        }
    }

    Ok(metadata)
}

async fn open_store(config: &Config) -> Result<Arc<VectorStore>> {
    let embedder = build_embedder(config)?;
    let store = VectorStore::new(config, embedder)
        .await
        .context("Failed to open vector store")?;
    Ok(Arc::new(store))
}

async fn open_indexer(config: &Config) -> Result<Indexer> {
    let store = open_store(config).await?;
    Indexer::from_config(config, store)
        .await
        .context("Failed to initialize indexer")
}

async fn open_pipeline(config: &Config) -> Result<RetrievalPipeline> {
    let store = open_store(config).await?;
    RetrievalPipeline::from_config(config, store).context("Failed to initialize retrieval")
}

fn print_report(report: &IngestReport) {
    if report.is_success() {
        println!(
            "✅ {} -> {} ({} chunks)",
            report.path.display(),
            report.document_id,
            report.chunks_ingested
        );
    } else {
        println!(
            "❌ {}: {}",
            report.path.display(),
            report.message.as_deref().unwrap_or("unknown error")
        );
        if report.chunks_ingested > 0 {
            println!(
                "   ⚠️  Partially ingested: {} chunks stored under {}",
                report.chunks_ingested, report.document_id
            );
        }
    }
}

/// Ingest a single document
#[inline]
pub async fn ingest_file(
    config: &Config,
    path: &Path,
    document_type: Option<DocumentType>,
    metadata: Metadata,
) -> Result<IngestReport> {
    let indexer = open_indexer(config).await?;
    let report = indexer.ingest(path, document_type, metadata).await;
    print_report(&report);

    if let Some(stats) = &report.stats {
        println!(
            "   Collection '{}' now holds {} chunks",
            stats.collection_name, stats.chunk_count
        );
    }

    Ok(report)
}

/// Ingest every supported file in a directory
#[inline]
pub async fn ingest_dir(
    config: &Config,
    dir: &Path,
    metadata: &Metadata,
) -> Result<Vec<IngestReport>> {
    let indexer = open_indexer(config).await?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template("{bar:30} [{pos}/{len}] Ingesting {msg}")
                .context("Invalid progress template")?,
        )
    } else {
        ProgressBar::hidden()
    };

    let reports = indexer
        .ingest_directory_with(dir, metadata, |progress| match progress {
            DirectoryProgress::Found(total) => bar.set_length(total as u64),
            DirectoryProgress::Ingesting(file) => bar.set_message(
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            DirectoryProgress::Ingested(report) => {
                bar.suspend(|| print_report(report));
                bar.inc(1);
            }
        })
        .await?;
    bar.finish_and_clear();

    if reports.is_empty() {
        println!("No supported documents found in {}", dir.display());
        return Ok(reports);
    }

    let succeeded = reports.iter().filter(|r| r.is_success()).count();
    let chunks: usize = reports.iter().map(|r| r.chunks_ingested).sum();
    println!();
    println!("Summary:");
    println!("  Documents: {}", reports.len());
    println!("  Succeeded: {}", succeeded);
    println!("  Failed: {}", reports.len() - succeeded);
    println!("  Chunks stored: {}", chunks);

    Ok(reports)
}

/// Delete a document and all of its chunks
#[inline]
pub async fn delete_document(config: &Config, document_id: &str) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let report = indexer.delete(document_id).await?;

    match report.status {
        DeleteStatus::Success => println!("✓ Deleted document {}", report.document_id),
        DeleteStatus::NotFound => println!("Document not found: {}", report.document_id),
    }

    Ok(())
}

/// List registered documents
#[inline]
pub async fn list_documents(config: &Config) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let documents = indexer.list_documents().await?;

    if documents.is_empty() {
        println!("No documents have been ingested yet.");
        println!("Use 'finlit-rag ingest <path>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    println!();

    for document in &documents {
        println!("📄 {} ({})", document.filename, document.document_id);
        println!("   Type: {}", document.document_type);
        println!("   Chunks: {}", document.chunk_count);
        for key in ["age_group", "region", "category"] {
            if let Some(value) = document.metadata.get(key) {
                println!("   {}: {}", key, value);
            }
        }
        println!(
            "   Ingested: {}",
            document.ingested_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!();
    }

    Ok(())
}

fn print_results(results: &[RetrievalResult]) {
    if results.is_empty() {
        println!("No matching chunks.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        let kind = match result.score_kind {
            ScoreKind::Similarity => "similarity",
            ScoreKind::Rerank => "rerank",
        };
        let mut location = String::new();
        if let Some(page) = result.page_number {
            location = format!(" page {page}");
        }
        if let Some(section) = &result.section {
            location = format!("{location} § {section}");
        }

        println!(
            "{}. {} [{}{}] ({} {:.3})",
            i + 1,
            result.source(),
            result.chunk_id,
            location,
            kind,
            result.score
        );
        println!("   {}", result.content.replace('\n', "\n   "));
        println!();
    }
}

/// Retrieve and print the best chunks for a query
#[inline]
pub async fn search(config: &Config, query: &str, options: &QueryOptions) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let (top_k, rerank_top_k) = options.limits(config);
    let filter = options.filter();

    info!("Searching for '{}' (top_k {}, rerank {:?})", query, top_k, rerank_top_k);
    let results = pipeline
        .retrieve(query, top_k, rerank_top_k, filter.as_ref())
        .await?;

    print_results(&results);
    Ok(())
}

/// Retrieve context and have the chat model answer the question
#[inline]
pub async fn ask(config: &Config, query: &str, options: &QueryOptions) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let generator = Arc::new(OllamaGenerator::from_config(config)?);
    let (top_k, rerank_top_k) = options.limits(config);
    let filter = options.filter();

    let results = pipeline
        .retrieve(query, top_k, rerank_top_k, filter.as_ref())
        .await?;
    let context = format_context(&results);
    let prompt = build_prompt(
        query,
        &context,
        options.age_group.as_deref(),
        options.region.as_deref(),
    );

    match generate_answer(generator, prompt).await {
        Ok(answer) => {
            println!("{}", answer);
            if !results.is_empty() {
                println!();
                println!("Sources:");
                for result in &results {
                    println!("  - {} ({})", result.source(), result.chunk_id);
                }
            }
            Ok(())
        }
        Err(e) => {
            error!("Generation failed: {}", e);
            Err(e.into())
        }
    }
}

/// Show collection and registry statistics
#[inline]
pub async fn show_stats(config: &Config) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let stats = indexer.stats().await?;
    let documents = indexer.list_documents().await?;

    println!("📊 Collection Statistics");
    println!("{}", "=".repeat(40));
    println!("  Collection: {}", stats.collection_name);
    println!("  Embedding Model: {}", stats.embedding_model);
    println!("  Embedding Dimension: {}", stats.embedding_dimension);
    println!("  Chunks: {}", stats.chunk_count);
    println!("  Documents: {}", documents.len());
    println!("  Base Directory: {}", config.get_base_dir().display());

    Ok(())
}
