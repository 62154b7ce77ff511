use clap::{Args, Parser, Subcommand};
use finlit_rag::Result;
use finlit_rag::commands::{
    QueryOptions, ask, delete_document, ingest_dir, ingest_file, list_documents, parse_metadata,
    search, show_stats,
};
use finlit_rag::config::{Config, resolve_base_dir, show_config};
use finlit_rag::embeddings::chunking::Metadata;
use finlit_rag::loader::DocumentType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "finlit-rag")]
#[command(about = "Retrieval-augmented answers to financial literacy questions")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, the vector store and the document registry
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct MetadataArgs {
    /// Target age group: 15-20, 21-28, 29-35 or all
    #[arg(long)]
    age_group: Option<String>,
    /// Target region: india, international or all
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Extra metadata as key=value, repeatable
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    meta: Vec<String>,
}

impl MetadataArgs {
    fn into_metadata(self) -> anyhow::Result<Metadata> {
        parse_metadata(
            self.age_group.as_deref(),
            self.region.as_deref(),
            self.category.as_deref(),
            &self.meta,
        )
    }
}

#[derive(Args, Debug, Default)]
struct QueryArgs {
    /// First-stage candidates to retrieve
    #[arg(long)]
    top_k: Option<usize>,
    /// Results kept after reranking
    #[arg(long)]
    rerank_top_k: Option<usize>,
    /// Skip the cross-encoder and return similarity results
    #[arg(long)]
    no_rerank: bool,
    /// Only use content for this age group (plus "all")
    #[arg(long)]
    age_group: Option<String>,
    /// Only use content for this region (plus "all")
    #[arg(long)]
    region: Option<String>,
}

impl From<QueryArgs> for QueryOptions {
    fn from(args: QueryArgs) -> Self {
        Self {
            top_k: args.top_k,
            rerank_top_k: args.rerank_top_k,
            no_rerank: args.no_rerank,
            age_group: args.age_group,
            region: args.region,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to config.toml
        #[arg(long)]
        init: bool,
    },
    /// Ingest a single document
    Ingest {
        path: PathBuf,
        /// Override extension-based format detection
        #[arg(long = "type")]
        document_type: Option<DocumentType>,
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    /// Ingest every supported document in a directory
    IngestDir {
        dir: PathBuf,
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    /// Delete a document and its chunks
    Delete { document_id: String },
    /// List ingested documents
    Documents,
    /// Retrieve the most relevant chunks for a query
    Search {
        query: String,
        #[command(flatten)]
        options: QueryArgs,
    },
    /// Answer a question using retrieved context
    Ask {
        query: String,
        #[command(flatten)]
        options: QueryArgs,
    },
    /// Show collection statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir).map_err(anyhow::Error::from)?;
    let config = Config::load(&base_dir)?;

    match cli.command {
        Commands::Config { init } => {
            if init {
                config.save()?;
                eprintln!("Wrote {}", config.config_file_path().display());
            }
            show_config(&config)?;
        }
        Commands::Ingest {
            path,
            document_type,
            metadata,
        } => {
            ingest_file(&config, &path, document_type, metadata.into_metadata()?).await?;
        }
        Commands::IngestDir { dir, metadata } => {
            ingest_dir(&config, &dir, &metadata.into_metadata()?).await?;
        }
        Commands::Delete { document_id } => {
            delete_document(&config, &document_id).await?;
        }
        Commands::Documents => {
            list_documents(&config).await?;
        }
        Commands::Search { query, options } => {
            search(&config, &query, &options.into()).await?;
        }
        Commands::Ask { query, options } => {
            ask(&config, &query, &options.into()).await?;
        }
        Commands::Stats => {
            show_stats(&config).await?;
        }
    }

    Ok(())
}
