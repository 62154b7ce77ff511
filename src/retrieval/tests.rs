use super::*;
use crate::RagError;
use crate::embeddings::HashEmbedder;
use crate::embeddings::chunking::Chunk;
use crate::rerank::{CrossEncoder, LexicalCrossEncoder};
use tempfile::TempDir;

/// Scores a passage by the number from its trailing "#n" marker
struct MarkerEncoder;

impl CrossEncoder for MarkerEncoder {
    fn model_name(&self) -> &str {
        "marker"
    }

    fn score(&self, _query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>> {
        passages
            .iter()
            .map(|p| {
                p.rsplit('#')
                    .next()
                    .and_then(|n| n.trim().parse::<f32>().ok())
                    .ok_or_else(|| anyhow::anyhow!("passage has no marker: {p}"))
            })
            .collect()
    }
}

struct BrokenEncoder;

impl CrossEncoder for BrokenEncoder {
    fn model_name(&self) -> &str {
        "broken"
    }

    fn score(&self, _query: &str, _passages: &[String]) -> anyhow::Result<Vec<f32>> {
        Err(anyhow::anyhow!("cross-encoder offline"))
    }
}

async fn create_test_store() -> (Arc<VectorStore>, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(
        &temp_dir.path().join("vectors"),
        "financial_knowledge",
        Arc::new(HashEmbedder::new(64)),
    )
    .await
    .expect("should open vector store");
    (Arc::new(store), temp_dir)
}

fn chunk(document_id: &str, index: u32, content: &str, age_group: &str) -> Chunk {
    Chunk {
        chunk_id: crate::embeddings::chunk_id(document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        content: content.to_string(),
        start_offset: 0,
        page_number: None,
        section: None,
        metadata: Metadata::from([
            ("source".to_string(), format!("{document_id}.txt")),
            ("age_group".to_string(), age_group.to_string()),
        ]),
    }
}

/// Six investing passages whose marker order is the reverse of their ids
async fn seed_investing(store: &VectorStore) {
    let chunks: Vec<Chunk> = (0..6)
        .map(|i| {
            chunk(
                "doc_invest",
                i,
                &format!("investing in index funds builds wealth over time #{}", 6 - i),
                "all",
            )
        })
        .collect();
    store.insert(&chunks).await.expect("should insert chunks");
}

#[tokio::test]
async fn rerank_keeps_best_three_of_six() {
    let (store, _temp_dir) = create_test_store().await;
    seed_investing(&store).await;

    let pipeline = RetrievalPipeline::new(store, Some(Reranker::new(Arc::new(MarkerEncoder))));
    let results = pipeline
        .retrieve("investing", 6, Some(3), None)
        .await
        .expect("should retrieve");

    assert_eq!(results.len(), 3);
    let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["doc_invest_chunk_0", "doc_invest_chunk_1", "doc_invest_chunk_2"]
    );
    assert!(results.iter().all(|r| r.score_kind == ScoreKind::Rerank));
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn without_rerank_returns_similarity_results() {
    let (store, _temp_dir) = create_test_store().await;
    seed_investing(&store).await;

    let pipeline = RetrievalPipeline::new(store, Some(Reranker::new(Arc::new(BrokenEncoder))));
    let results = pipeline
        .retrieve("investing", 4, None, None)
        .await
        .expect("should retrieve without reranking");

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.score_kind == ScoreKind::Similarity));
    assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
}

#[tokio::test]
async fn single_candidate_is_not_reranked() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .insert(&[chunk("doc_one", 0, "a budget tracks income and spending", "all")])
        .await
        .expect("should insert chunk");

    let pipeline = RetrievalPipeline::new(store, Some(Reranker::new(Arc::new(BrokenEncoder))));
    let results = pipeline
        .retrieve("budget", 5, Some(3), None)
        .await
        .expect("single candidate should skip the reranker");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].score_kind, ScoreKind::Similarity);
}

#[tokio::test]
async fn empty_store_returns_empty() {
    let (store, _temp_dir) = create_test_store().await;
    let pipeline = RetrievalPipeline::new(store, Some(Reranker::new(Arc::new(BrokenEncoder))));

    let results = pipeline
        .retrieve("anything", 5, Some(3), None)
        .await
        .expect("empty store should not error");
    assert!(results.is_empty());
}

#[tokio::test]
async fn rerank_failure_propagates() {
    let (store, _temp_dir) = create_test_store().await;
    seed_investing(&store).await;

    let pipeline = RetrievalPipeline::new(store, Some(Reranker::new(Arc::new(BrokenEncoder))));
    let result = pipeline.retrieve("investing", 6, Some(3), None).await;
    assert!(matches!(result, Err(RagError::Rerank(_))));
}

#[tokio::test]
async fn rerank_failure_degrades_when_enabled() {
    let (store, _temp_dir) = create_test_store().await;
    seed_investing(&store).await;

    let pipeline = RetrievalPipeline::new(store, Some(Reranker::new(Arc::new(BrokenEncoder))))
        .with_fallback_on_rerank_error(true);
    let results = pipeline
        .retrieve("investing", 6, Some(3), None)
        .await
        .expect("should fall back to first-stage results");

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.score_kind == ScoreKind::Similarity));
}

#[tokio::test]
async fn filter_is_applied_before_rerank() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .insert(&[
            chunk("doc_teen", 0, "investing pocket money early #9", "15-20"),
            chunk("doc_all", 0, "investing basics for everyone #1", "all"),
            chunk("doc_all", 1, "investing with a monthly plan #2", "all"),
        ])
        .await
        .expect("should insert chunks");

    let pipeline = RetrievalPipeline::new(store, Some(Reranker::new(Arc::new(MarkerEncoder))));
    let filter = MetadataFilter::one_of("age_group", ["21-28", "all"]);
    let results = pipeline
        .retrieve("investing", 5, Some(2), Some(&filter))
        .await
        .expect("should retrieve");

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.document_id == "doc_all"));
    assert_eq!(results[0].chunk_id, "doc_all_chunk_1");
}

#[tokio::test]
async fn lexical_reranker_prefers_matching_passage() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .insert(&[
            chunk("doc_a", 0, "Credit cards charge interest on unpaid balances.", "all"),
            chunk("doc_b", 0, "An emergency fund covers three to six months of expenses.", "all"),
            chunk("doc_c", 0, "Gold prices move with global demand.", "all"),
        ])
        .await
        .expect("should insert chunks");

    let pipeline =
        RetrievalPipeline::new(store, Some(Reranker::new(Arc::new(LexicalCrossEncoder))));
    let results = pipeline
        .retrieve("how big should an emergency fund be", 3, Some(1), None)
        .await
        .expect("should retrieve");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_id, "doc_b");
}

#[test]
fn result_metadata_carries_locators() {
    let mut scored_chunk = chunk("doc_pdf", 2, "Page text", "all");
    scored_chunk.page_number = Some(4);
    scored_chunk.section = Some("Saving > Goals".to_string());

    let result = RetrievalResult::from_scored(
        ScoredChunk {
            chunk: scored_chunk,
            score: 0.5,
        },
        ScoreKind::Similarity,
    );

    assert_eq!(result.metadata.get("document_id").map(String::as_str), Some("doc_pdf"));
    assert_eq!(result.metadata.get("page").map(String::as_str), Some("4"));
    assert_eq!(
        result.metadata.get("section").map(String::as_str),
        Some("Saving > Goals")
    );
    assert_eq!(result.source(), "doc_pdf.txt");
}

#[test]
fn format_context_blocks() {
    let mut first = chunk("doc_a", 0, "Save first, spend later.", "all");
    first.page_number = Some(2);
    let second = chunk("doc_b", 0, "Diversify investments.", "all");

    let results = vec![
        RetrievalResult::from_scored(ScoredChunk { chunk: first, score: 0.91234 }, ScoreKind::Similarity),
        RetrievalResult::from_scored(ScoredChunk { chunk: second, score: 0.5 }, ScoreKind::Similarity),
    ];

    assert_eq!(
        format_context(&results),
        "[Document 1] Source: doc_a.txt (page 2)\nSave first, spend later.\nRelevance score: 0.912\n\
         \n[Document 2] Source: doc_b.txt\nDiversify investments.\nRelevance score: 0.500\n"
    );
}

#[test]
fn format_context_empty() {
    assert_eq!(format_context(&[]), NO_CONTEXT);
}
