//! Relational store
//!
//! Repository traits are the seam between pipeline stages and Postgres. Each
//! has a Postgres implementation and an in-memory one for tests and dry runs.

use async_trait::async_trait;
use matchday_common::ScopeKey;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::PipelineResult;
use crate::models::{
    FixtureRow, League, NewPipelineRun, PipelineRun, RunCompletion, ScopeFilter, Season,
};

pub mod catalog;
pub mod fixtures;
pub mod memory;
pub mod runs;

pub use catalog::PgScopeCatalog;
pub use fixtures::PgFixtureRepository;
pub use memory::{MemoryFixtureRepository, MemoryRunRepository, StaticCatalog};
pub use runs::PgRunRepository;

/// Fixture rows, owned exclusively by the load stage
#[async_trait]
pub trait FixtureRepository: Send + Sync {
    /// Delete every row of `scope`, then insert `rows`. Returns rows inserted.
    async fn replace_scope(&self, scope: ScopeKey, rows: &[FixtureRow]) -> PipelineResult<u64>;

    /// Rows of one scope ordered by kickoff date
    async fn list_scope(&self, scope: ScopeKey) -> PipelineResult<Vec<FixtureRow>>;
}

/// Pipeline run history
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert a `RUNNING` record
    async fn create(&self, run: NewPipelineRun) -> PipelineResult<PipelineRun>;

    /// Apply the terminal transition to a running record
    async fn finish(&self, id: i64, completion: RunCompletion) -> PipelineResult<PipelineRun>;

    /// Most recently started `SUCCESS` record matching `filter`, ties broken by id
    async fn latest_successful(&self, filter: ScopeFilter) -> PipelineResult<Option<PipelineRun>>;

    async fn recent(&self, filter: ScopeFilter, limit: i64) -> PipelineResult<Vec<PipelineRun>>;
}

/// Configured leagues and seasons the orchestrator enumerates
#[async_trait]
pub trait ScopeCatalog: Send + Sync {
    async fn leagues(&self) -> PipelineResult<Vec<League>>;

    async fn seasons(&self) -> PipelineResult<Vec<Season>>;
}

pub async fn create_pool(config: &DatabaseConfig) -> PipelineResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await?;

    tracing::info!(
        url = %config.redacted_url(),
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Apply pending migrations from the workspace `migrations/` directory
pub async fn run_migrations(pool: &PgPool) -> PipelineResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::debug!("Database migrations applied");
    Ok(())
}
