use async_trait::async_trait;
use matchday_common::ScopeKey;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info, instrument};

use super::FixtureRepository;
use crate::error::PipelineResult;
use crate::models::FixtureRow;

/// 17 binds per row keeps a full chunk well under the Postgres bind limit
const INSERT_CHUNK_SIZE: usize = 1000;

const FIXTURE_COLUMNS: &str = r#"fixture_id, "date", "timestamp", venue_id, venue_name,
    status_short, status_long, league_id, league_name, season_year, league_round,
    home_team_id, home_team_name, away_team_id, away_team_name, goals_home, goals_away"#;

#[derive(Debug, Clone)]
pub struct PgFixtureRepository {
    pool: PgPool,
}

impl PgFixtureRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn batch_insert(
        tx: &mut Transaction<'_, Postgres>,
        rows: &[FixtureRow],
    ) -> PipelineResult<u64> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO fixtures ({}) ", FIXTURE_COLUMNS));

        query_builder.push_values(rows, |mut b, row| {
            b.push_bind(row.fixture_id)
                .push_bind(row.date)
                .push_bind(row.timestamp)
                .push_bind(row.venue_id)
                .push_bind(&row.venue_name)
                .push_bind(&row.status_short)
                .push_bind(&row.status_long)
                .push_bind(row.league_id)
                .push_bind(&row.league_name)
                .push_bind(row.season_year)
                .push_bind(&row.league_round)
                .push_bind(row.home_team_id)
                .push_bind(&row.home_team_name)
                .push_bind(row.away_team_id)
                .push_bind(&row.away_team_name)
                .push_bind(row.goals_home)
                .push_bind(row.goals_away);
        });

        let result = query_builder.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FixtureRepository for PgFixtureRepository {
    #[instrument(skip(self, rows), fields(%scope, rows = rows.len()))]
    async fn replace_scope(&self, scope: ScopeKey, rows: &[FixtureRow]) -> PipelineResult<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM fixtures WHERE league_id = $1 AND season_year = $2")
            .bind(scope.league_id)
            .bind(scope.season_year)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        debug!(deleted, "Cleared scope");

        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            inserted += Self::batch_insert(&mut tx, chunk).await?;
        }

        tx.commit().await?;

        info!(deleted, inserted, "Replaced fixtures");
        Ok(inserted)
    }

    async fn list_scope(&self, scope: ScopeKey) -> PipelineResult<Vec<FixtureRow>> {
        let rows = sqlx::query_as::<_, FixtureRow>(&format!(
            r#"SELECT {} FROM fixtures
               WHERE league_id = $1 AND season_year = $2
               ORDER BY "date" ASC NULLS LAST, fixture_id ASC"#,
            FIXTURE_COLUMNS
        ))
        .bind(scope.league_id)
        .bind(scope.season_year)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
