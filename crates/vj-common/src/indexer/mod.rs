//! Upsert-style bulk indexing backends.

pub mod elasticsearch;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Job;

pub use elasticsearch::ElasticsearchIndexer;
pub use postgres::PostgresIndexer;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to create postgres pool: {0}")]
    PoolCreate(#[from] deadpool_postgres::CreatePoolError),
    #[error("failed to get postgres connection: {0}")]
    PoolGet(#[from] deadpool_postgres::PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("indexer http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("indexer backend error: {0}")]
    Backend(String),
    #[error("invalid indexer configuration: {0}")]
    InvalidConfig(String),
}

/// Insert-or-replace keyed on `job.id`. Atomic per job, not across the
/// batch; per-job failures are logged by the implementation and do not
/// abort the rest. An empty batch is a no-op.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn bulk_index(&self, jobs: &[Job]) -> Result<(), IndexError>;
}
