use super::*;

fn row(document_type: &str, metadata: &str) -> DocumentRow {
    DocumentRow {
        document_id: "doc_0123456789ab".to_string(),
        filename: "budget.pdf".to_string(),
        document_type: document_type.to_string(),
        ingested_at: Utc::now(),
        metadata: metadata.to_string(),
        chunk_count: 4,
    }
}

#[test]
fn row_converts_to_document() {
    let document = SourceDocument::try_from(row("pdf", r#"{"region":"india"}"#))
        .expect("row should convert");

    assert_eq!(document.document_type, DocumentType::Pdf);
    assert_eq!(
        document.metadata.get("region").map(String::as_str),
        Some("india")
    );
    assert_eq!(document.chunk_count, 4);
}

#[test]
fn corrupt_metadata_is_registry_error() {
    let result = SourceDocument::try_from(row("pdf", "not json"));
    assert!(matches!(result, Err(RagError::Registry(_))));
}

#[test]
fn unknown_type_is_rejected() {
    let result = SourceDocument::try_from(row("spreadsheet", "{}"));
    assert!(matches!(result, Err(RagError::UnsupportedFormat(_))));
}
