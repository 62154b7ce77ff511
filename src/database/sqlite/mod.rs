use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::sqlite::models::{NewSourceDocument, SourceDocument};
use crate::database::sqlite::queries::DocumentQueries;

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// SQLite registry of ingested source documents
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config(config: &Config) -> Result<Self> {
        let base_dir = config.get_base_dir();

        std::fs::create_dir_all(base_dir)
            .with_context(|| format!("Failed to create base directory: {}", base_dir.display()))?;

        Self::new(config.registry_path()).await
    }

    #[inline]
    pub async fn register_document(&self, document: NewSourceDocument) -> Result<SourceDocument> {
        DocumentQueries::create(&self.pool, document).await
    }

    #[inline]
    pub async fn get_document(&self, document_id: &str) -> Result<Option<SourceDocument>> {
        DocumentQueries::get_by_id(&self.pool, document_id).await
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<SourceDocument>> {
        DocumentQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<bool> {
        DocumentQueries::delete(&self.pool, document_id).await
    }

    #[inline]
    pub async fn count_documents(&self) -> Result<i64> {
        DocumentQueries::count(&self.pool).await
    }
}
