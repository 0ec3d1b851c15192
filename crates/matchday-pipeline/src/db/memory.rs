//! In-memory repositories for tests and dry runs

use async_trait::async_trait;
use matchday_common::ScopeKey;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{FixtureRepository, RunRepository, ScopeCatalog};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    FixtureRow, League, NewPipelineRun, PipelineRun, RunCompletion, RunStatus, ScopeFilter,
    Season,
};

fn guard<T>(mutex: &Mutex<T>) -> PipelineResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| PipelineError::Storage("in-memory repository lock poisoned".to_string()))
}

#[derive(Debug, Default)]
struct FixtureState {
    scopes: BTreeMap<ScopeKey, Vec<FixtureRow>>,
    replace_calls: Vec<ScopeKey>,
}

/// Fixture table keyed by scope; clones share state
#[derive(Debug, Clone, Default)]
pub struct MemoryFixtureRepository {
    state: Arc<Mutex<FixtureState>>,
}

impl MemoryFixtureRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes passed to `replace_scope`, in call order
    pub fn replace_calls(&self) -> Vec<ScopeKey> {
        guard(&self.state)
            .map(|s| s.replace_calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FixtureRepository for MemoryFixtureRepository {
    async fn replace_scope(&self, scope: ScopeKey, rows: &[FixtureRow]) -> PipelineResult<u64> {
        let mut state = guard(&self.state)?;
        state.replace_calls.push(scope);
        state.scopes.insert(scope, rows.to_vec());
        Ok(rows.len() as u64)
    }

    async fn list_scope(&self, scope: ScopeKey) -> PipelineResult<Vec<FixtureRow>> {
        let mut rows = guard(&self.state)?
            .scopes
            .get(&scope)
            .cloned()
            .unwrap_or_default();
        // Stable sort; undated fixtures last
        rows.sort_by_key(|r| (r.date.is_none(), r.date, r.fixture_id));
        Ok(rows)
    }
}

/// Run history held in a vector; ids are assigned sequentially from 1
#[derive(Debug, Clone, Default)]
pub struct MemoryRunRepository {
    runs: Arc<Mutex<Vec<PipelineRun>>>,
}

impl MemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, in creation order
    pub fn all(&self) -> Vec<PipelineRun> {
        guard(&self.runs).map(|r| r.clone()).unwrap_or_default()
    }
}

fn newest_first(runs: &[PipelineRun], filter: ScopeFilter) -> Vec<PipelineRun> {
    let mut matching: Vec<PipelineRun> =
        runs.iter().filter(|r| filter.matches(r)).cloned().collect();
    matching.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
    matching
}

#[async_trait]
impl RunRepository for MemoryRunRepository {
    async fn create(&self, run: NewPipelineRun) -> PipelineResult<PipelineRun> {
        let mut runs = guard(&self.runs)?;
        let record = PipelineRun {
            id: runs.len() as i64 + 1,
            league_id: run.scope.map(|s| s.league_id),
            season_year: run.scope.map(|s| s.season_year),
            source: run.source,
            status: RunStatus::Running,
            error_kind: None,
            error_summary: String::new(),
            started_at: run.started_at,
            finished_at: None,
        };
        runs.push(record.clone());
        Ok(record)
    }

    async fn finish(&self, id: i64, completion: RunCompletion) -> PipelineResult<PipelineRun> {
        let mut runs = guard(&self.runs)?;
        let record = runs
            .iter_mut()
            .find(|r| r.id == id && r.status == RunStatus::Running)
            .ok_or(PipelineError::Database(sqlx::Error::RowNotFound))?;

        record.status = completion.status;
        record.error_kind = completion.error_kind;
        record.error_summary = completion.error_summary;
        record.finished_at = Some(completion.finished_at);
        Ok(record.clone())
    }

    async fn latest_successful(&self, filter: ScopeFilter) -> PipelineResult<Option<PipelineRun>> {
        let runs = guard(&self.runs)?;
        Ok(newest_first(&runs, filter)
            .into_iter()
            .find(|r| r.status == RunStatus::Success))
    }

    async fn recent(&self, filter: ScopeFilter, limit: i64) -> PipelineResult<Vec<PipelineRun>> {
        let runs = guard(&self.runs)?;
        let mut matching = newest_first(&runs, filter);
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }
}

/// Fixed league and season lists
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    leagues: Vec<League>,
    seasons: Vec<Season>,
}

impl StaticCatalog {
    pub fn new(leagues: Vec<League>, seasons: Vec<Season>) -> Self {
        Self { leagues, seasons }
    }

    /// Catalog from bare ids, named after the id
    pub fn from_ids(league_ids: &[i32], season_years: &[i32]) -> Self {
        let leagues = league_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| League {
                id,
                name: format!("League {}", id),
                display_order: i as i16,
            })
            .collect();
        let seasons = season_years
            .iter()
            .map(|&year| Season {
                api_year: year,
                display: format!("{}/{:02}", year, (year + 1) % 100),
                display_order: 0,
            })
            .collect();
        Self::new(leagues, seasons)
    }
}

#[async_trait]
impl ScopeCatalog for StaticCatalog {
    async fn leagues(&self) -> PipelineResult<Vec<League>> {
        Ok(self.leagues.clone())
    }

    async fn seasons(&self) -> PipelineResult<Vec<Season>> {
        Ok(self.seasons.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn row(fixture_id: i64, scope: ScopeKey) -> FixtureRow {
        FixtureRow {
            fixture_id,
            date: None,
            timestamp: None,
            venue_id: None,
            venue_name: None,
            status_short: None,
            status_long: None,
            league_id: scope.league_id,
            league_name: None,
            season_year: scope.season_year,
            league_round: None,
            home_team_id: None,
            home_team_name: None,
            away_team_id: None,
            away_team_name: None,
            goals_home: None,
            goals_away: None,
        }
    }

    #[tokio::test]
    async fn test_replace_scope_leaves_other_scopes_alone() {
        let repo = MemoryFixtureRepository::new();
        let s1 = ScopeKey::new(39, 2025);
        let s2 = ScopeKey::new(39, 2024);

        repo.replace_scope(s1, &[row(1, s1), row(2, s1)]).await.unwrap();
        repo.replace_scope(s2, &[row(9, s2)]).await.unwrap();
        let inserted = repo.replace_scope(s1, &[row(3, s1)]).await.unwrap();

        assert_eq!(inserted, 1);
        let ids: Vec<i64> = repo.list_scope(s1).await.unwrap().iter().map(|r| r.fixture_id).collect();
        assert_eq!(ids, vec![3]);
        assert_eq!(repo.list_scope(s2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_successful_orders_by_start_then_id() {
        let repo = MemoryRunRepository::new();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 15, 15, 0, 0).unwrap();
        let scope = ScopeKey::new(39, 2025);

        for (offset, scope) in [(0, Some(scope)), (5, Some(scope)), (5, Some(scope)), (10, None)] {
            let run = repo
                .create(NewPipelineRun {
                    scope,
                    source: "cli".into(),
                    started_at: t0 + Duration::minutes(offset),
                })
                .await
                .unwrap();
            repo.finish(
                run.id,
                RunCompletion {
                    status: RunStatus::Success,
                    error_kind: None,
                    error_summary: String::new(),
                    finished_at: t0 + Duration::minutes(offset + 1),
                },
            )
            .await
            .unwrap();
        }

        let latest = repo.latest_successful(scope.into()).await.unwrap().unwrap();
        assert_eq!(latest.id, 3);

        let global = repo.latest_successful(ScopeFilter::any()).await.unwrap().unwrap();
        assert_eq!(global.id, 4);
    }

    #[tokio::test]
    async fn test_finish_only_applies_once() {
        let repo = MemoryRunRepository::new();
        let run = repo
            .create(NewPipelineRun {
                scope: None,
                source: "scheduled".into(),
                started_at: Utc::now(),
            })
            .await
            .unwrap();

        let completion = RunCompletion {
            status: RunStatus::Success,
            error_kind: None,
            error_summary: String::new(),
            finished_at: Utc::now(),
        };
        repo.finish(run.id, completion.clone()).await.unwrap();
        assert!(repo.finish(run.id, completion).await.is_err());
    }

    #[test]
    fn test_static_catalog_season_display() {
        let catalog = StaticCatalog::from_ids(&[39], &[2025, 1999]);
        assert_eq!(catalog.seasons[0].display, "2025/26");
        assert_eq!(catalog.seasons[1].display, "1999/00");
    }
}
