
use anyhow::Result;
use console::style;

use super::{Config, EmbeddingProvider, RerankerProvider};

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Embedding Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Provider: {}", style(embedding_label(config)).cyan());

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Reranker:").bold().yellow());
    match config.reranker.provider {
        RerankerProvider::Http => {
            eprintln!("  Provider: {}", style("http").cyan());
            eprintln!("  URL: {}", style(&config.reranker.url).cyan());
            eprintln!("  Model: {}", style(&config.reranker.model).cyan());
        }
        RerankerProvider::Lexical => eprintln!("  Provider: {}", style("lexical").cyan()),
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Rerank Top K: {}",
        style(config.retrieval.rerank_top_k).cyan()
    );
    eprintln!(
        "  Fallback On Rerank Error: {}",
        style(config.retrieval.fallback_on_rerank_error).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!("  Model: {}", style(&config.generation.model).cyan());
    eprintln!(
        "  Temperature: {}",
        style(config.generation.temperature).cyan()
    );

    eprintln!();
    eprintln!(
        "Collection: {}",
        style(&config.storage.collection_name).cyan()
    );
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!(
        "Vector store: {}",
        style(config.vector_database_path().display()).dim()
    );

    Ok(())
}

pub(crate) fn embedding_label(config: &Config) -> String {
    match config.embedding.provider {
        EmbeddingProvider::Ollama => format!("ollama ({})", config.ollama.model),
        EmbeddingProvider::Hash => format!("hash ({} dims)", config.embedding.hash_dimension),
    }
}
