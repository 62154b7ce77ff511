use super::*;
use crate::embeddings::chunking::Metadata;
use crate::loader::DocumentType;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let config = Config::with_base_dir(temp_dir.path().join("data"));
    let database = Database::initialize_from_config(&config).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'",
    )
    .fetch_all(&database.pool)
    .await?;

    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, HashSet::from(["documents"]));
    assert!(temp_dir.path().join("data/documents.db").exists());

    Ok(())
}

#[tokio::test]
async fn migrations_are_idempotent() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    database.run_migrations().await?;
    Ok(())
}

#[tokio::test]
async fn register_list_and_delete() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let document = database
        .register_document(NewSourceDocument {
            document_id: "doc_abcdef123456".to_string(),
            filename: "loans.csv".to_string(),
            document_type: DocumentType::Csv,
            metadata: Metadata::from([("age_group".to_string(), "15-20".to_string())]),
            chunk_count: 7,
        })
        .await?;

    assert_eq!(database.count_documents().await?, 1);
    assert_eq!(database.list_documents().await?, vec![document.clone()]);
    assert_eq!(
        database.get_document("doc_abcdef123456").await?,
        Some(document)
    );

    assert!(database.delete_document("doc_abcdef123456").await?);
    assert_eq!(database.count_documents().await?, 0);

    Ok(())
}
