#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// Integration tests for ingesting every supported format through the indexer
use finlit_rag::config::{Config, EmbeddingProvider, RerankerProvider};
use finlit_rag::database::lancedb::{MetadataFilter, VectorStore};
use finlit_rag::embeddings::build_embedder;
use finlit_rag::embeddings::chunking::Metadata;
use finlit_rag::indexer::{DeleteStatus, IngestReport, Indexer};
use finlit_rag::loader::DocumentType;
use finlit_rag::retrieval::RetrievalPipeline;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn create_test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::with_base_dir(temp_dir.path().join("data"));
    config.embedding.provider = EmbeddingProvider::Hash;
    config.reranker.provider = RerankerProvider::Lexical;
    config.chunking.chunk_size = 400;
    config.chunking.chunk_overlap = 80;
    config
}

async fn create_services(config: &Config) -> (Indexer, RetrievalPipeline) {
    let embedder = build_embedder(config).expect("should build embedder");
    let store = Arc::new(
        VectorStore::new(config, embedder)
            .await
            .expect("should open vector store"),
    );
    let indexer = Indexer::from_config(config, Arc::clone(&store))
        .await
        .expect("should create indexer");
    let pipeline =
        RetrievalPipeline::from_config(config, store).expect("should create pipeline");
    (indexer, pipeline)
}

fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .expect("should start zip entry");
        writer
            .write_all(xml.as_bytes())
            .expect("should write zip entry");
        writer.finish().expect("should finish zip");
    }
    buffer.into_inner()
}

fn write_corpus(dir: &Path) {
    std::fs::create_dir_all(dir).expect("should create corpus dir");
    std::fs::write(
        dir.join("budgeting.md"),
        "# Budgeting\n\n## The 50/30/20 rule\n\nSpend half on needs, 30% on wants and save 20%.\n\n\
         ## Tracking\n\nReview every expense at the end of the month.\n",
    )
    .expect("should write markdown");
    std::fs::write(
        dir.join("deposits.csv"),
        "scheme,rate,lock_in\nPPF,7.1%,15 years\nSukanya Samriddhi,8.2%,21 years\n",
    )
    .expect("should write csv");
    std::fs::write(
        dir.join("credit.html"),
        "<html><head><style>p{color:red}</style><script>track()</script></head>\
         <body><h1>Credit scores</h1><p>Pay your credit card bill in full each month.</p></body></html>",
    )
    .expect("should write html");
    std::fs::write(
        dir.join("glossary.json"),
        r#"{"term":"SIP","definition":"A systematic investment plan invests a fixed amount monthly."}"#,
    )
    .expect("should write json");
    std::fs::write(
        dir.join("insurance.docx"),
        build_docx(&[
            "Term insurance",
            "A pure term plan pays the nominee if the policyholder dies.",
        ]),
    )
    .expect("should write docx");
    std::fs::write(dir.join("README"), "no extension, skipped").expect("should write extra file");
}

#[tokio::test]
async fn ingests_every_supported_format() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let corpus = temp_dir.path().join("corpus");
    write_corpus(&corpus);

    let (indexer, pipeline) = create_services(&config).await;
    let reports = indexer
        .ingest_directory(&corpus, &Metadata::from([("region".to_string(), "india".to_string())]))
        .await
        .expect("should ingest corpus");

    assert_eq!(reports.len(), 5);
    for report in &reports {
        assert!(report.is_success(), "{:?}", report);
    }

    let documents = indexer.list_documents().await.expect("should list documents");
    let types: HashMap<String, DocumentType> = documents
        .iter()
        .map(|d| (d.filename.clone(), d.document_type))
        .collect();
    assert_eq!(types.get("budgeting.md"), Some(&DocumentType::Text));
    assert_eq!(types.get("deposits.csv"), Some(&DocumentType::Csv));
    assert_eq!(types.get("credit.html"), Some(&DocumentType::Html));
    assert_eq!(types.get("glossary.json"), Some(&DocumentType::Json));
    assert_eq!(types.get("insurance.docx"), Some(&DocumentType::Docx));

    let results = pipeline
        .retrieve("Sukanya Samriddhi rate", 5, Some(1), None)
        .await
        .expect("should retrieve");
    assert_eq!(results[0].source(), "deposits.csv");
    assert!(results[0].content.contains("Sukanya Samriddhi  8.2%"));

    let results = pipeline
        .retrieve("credit card bill", 5, Some(1), None)
        .await
        .expect("should retrieve");
    assert_eq!(results[0].source(), "credit.html");
    assert!(!results[0].content.contains("track()"));

    let results = pipeline
        .retrieve("term plan nominee", 5, Some(1), None)
        .await
        .expect("should retrieve");
    assert_eq!(results[0].source(), "insurance.docx");
}

#[tokio::test]
async fn markdown_sections_survive_to_results() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let corpus = temp_dir.path().join("corpus");
    write_corpus(&corpus);

    let (indexer, pipeline) = create_services(&config).await;
    let report = indexer
        .ingest(&corpus.join("budgeting.md"), None, Metadata::new())
        .await;
    assert!(report.is_success());

    let results = pipeline
        .retrieve("50/30/20 rule needs wants", 3, None, None)
        .await
        .expect("should retrieve");
    assert_eq!(results[0].section.as_deref(), Some("Budgeting"));
}

#[tokio::test]
async fn region_metadata_filters_search() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let corpus = temp_dir.path().join("corpus");
    write_corpus(&corpus);

    let (indexer, pipeline) = create_services(&config).await;
    let india = indexer
        .ingest(
            &corpus.join("deposits.csv"),
            None,
            Metadata::from([("region".to_string(), "india".to_string())]),
        )
        .await;
    let global = indexer
        .ingest(
            &corpus.join("credit.html"),
            None,
            Metadata::from([("region".to_string(), "international".to_string())]),
        )
        .await;
    assert!(india.is_success() && global.is_success());

    let filter = MetadataFilter::one_of("region", ["international", "all"]);
    let results = pipeline
        .retrieve("rate", 10, None, Some(&filter))
        .await
        .expect("should retrieve");
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.document_id == global.document_id));
}

#[tokio::test]
async fn reopening_keeps_documents_and_deletes_cascade() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let corpus = temp_dir.path().join("corpus");
    write_corpus(&corpus);

    let report: IngestReport = {
        let (indexer, _pipeline) = create_services(&config).await;
        indexer
            .ingest(&corpus.join("glossary.json"), None, Metadata::new())
            .await
    };
    assert!(report.is_success());

    let (indexer, pipeline) = create_services(&config).await;
    assert_eq!(indexer.list_documents().await.expect("should list").len(), 1);
    let stats = indexer.stats().await.expect("should get stats");
    assert_eq!(stats.embedding_model, "hash-384");
    assert!(stats.chunk_count >= 1);

    let deleted = indexer
        .delete(&report.document_id)
        .await
        .expect("should delete");
    assert_eq!(deleted.status, DeleteStatus::Success);
    assert!(
        pipeline
            .retrieve("systematic investment plan", 5, Some(3), None)
            .await
            .expect("should retrieve")
            .is_empty()
    );
    assert!(indexer.list_documents().await.expect("should list").is_empty());
}
