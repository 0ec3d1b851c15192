//! Relational load stage

use matchday_common::ScopeKey;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::db::FixtureRepository;
use crate::error::PipelineResult;
use crate::models::{FixtureRecord, FixtureRow};

pub struct LoadStage {
    fixtures: Arc<dyn FixtureRepository>,
}

impl LoadStage {
    pub fn new(fixtures: Arc<dyn FixtureRepository>) -> Self {
        Self { fixtures }
    }

    /// Replace every row of `scope` with `table`.
    ///
    /// Deletion happens even for an empty table, leaving the scope empty.
    /// Not safe to run concurrently for one scope; the pipeline lock
    /// serializes callers.
    #[instrument(skip(self, table), fields(league = scope.league_id, season = scope.season_year))]
    pub async fn load(&self, table: &[FixtureRecord], scope: ScopeKey) -> PipelineResult<u64> {
        let rows: Vec<FixtureRow> = table
            .iter()
            .filter_map(|record| FixtureRow::from_record(record, scope))
            .collect();

        if rows.len() < table.len() {
            warn!(dropped = table.len() - rows.len(), "Skipped rows without a fixture id");
        }

        let inserted = self.fixtures.replace_scope(scope, &rows).await?;
        if inserted == 0 {
            info!("No rows to load; scope cleared");
        } else {
            info!(inserted, "Loaded fixtures");
        }
        Ok(inserted)
    }
}
