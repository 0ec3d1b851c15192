use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::RunRepository;
use crate::error::PipelineResult;
use crate::models::{
    NewPipelineRun, PipelineRun, PipelineRunRow, RunCompletion, RunStatus, ScopeFilter,
};

const RUN_COLUMNS: &str = "id, league_id, season_year, source, status, error_kind, \
     error_summary, started_at, finished_at";

#[derive(Debug, Clone)]
pub struct PgRunRepository {
    pool: PgPool,
}

impl PgRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn filtered(filter: ScopeFilter, status: Option<RunStatus>) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM pipeline_runs WHERE TRUE",
            RUN_COLUMNS
        ));
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(league_id) = filter.league_id {
            qb.push(" AND league_id = ").push_bind(league_id);
        }
        if let Some(season_year) = filter.season_year {
            qb.push(" AND season_year = ").push_bind(season_year);
        }
        qb.push(" ORDER BY started_at DESC, id DESC");
        qb
    }
}

#[async_trait]
impl RunRepository for PgRunRepository {
    async fn create(&self, run: NewPipelineRun) -> PipelineResult<PipelineRun> {
        let row = sqlx::query_as::<_, PipelineRunRow>(&format!(
            r#"INSERT INTO pipeline_runs (league_id, season_year, source, status, started_at)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {}"#,
            RUN_COLUMNS
        ))
        .bind(run.scope.map(|s| s.league_id))
        .bind(run.scope.map(|s| s.season_year))
        .bind(&run.source)
        .bind(RunStatus::Running.as_str())
        .bind(run.started_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn finish(&self, id: i64, completion: RunCompletion) -> PipelineResult<PipelineRun> {
        // Terminal records are never mutated; a second finish finds no row
        let row = sqlx::query_as::<_, PipelineRunRow>(&format!(
            r#"UPDATE pipeline_runs
               SET status = $2, error_kind = $3, error_summary = $4, finished_at = $5
               WHERE id = $1 AND status = 'RUNNING'
               RETURNING {}"#,
            RUN_COLUMNS
        ))
        .bind(id)
        .bind(completion.status.as_str())
        .bind(completion.error_kind.map(|k| k.as_str()))
        .bind(&completion.error_summary)
        .bind(completion.finished_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn latest_successful(&self, filter: ScopeFilter) -> PipelineResult<Option<PipelineRun>> {
        let mut qb = Self::filtered(filter, Some(RunStatus::Success));
        qb.push(" LIMIT 1");

        let row = qb
            .build_query_as::<PipelineRunRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(PipelineRun::try_from).transpose()
    }

    async fn recent(&self, filter: ScopeFilter, limit: i64) -> PipelineResult<Vec<PipelineRun>> {
        let mut qb = Self::filtered(filter, None);
        qb.push(" LIMIT ").push_bind(limit);

        let rows = qb
            .build_query_as::<PipelineRunRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(PipelineRun::try_from).collect()
    }
}
