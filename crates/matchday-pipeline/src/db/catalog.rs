use async_trait::async_trait;
use sqlx::PgPool;

use super::ScopeCatalog;
use crate::error::PipelineResult;
use crate::models::{League, Season};

/// Leagues and seasons maintained in the `leagues` / `seasons` tables
#[derive(Debug, Clone)]
pub struct PgScopeCatalog {
    pool: PgPool,
}

impl PgScopeCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopeCatalog for PgScopeCatalog {
    async fn leagues(&self) -> PipelineResult<Vec<League>> {
        let leagues = sqlx::query_as::<_, League>(
            "SELECT id, name, display_order FROM leagues ORDER BY display_order, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(leagues)
    }

    async fn seasons(&self) -> PipelineResult<Vec<Season>> {
        let seasons = sqlx::query_as::<_, Season>(
            "SELECT api_year, display, display_order FROM seasons ORDER BY api_year DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(seasons)
    }
}
