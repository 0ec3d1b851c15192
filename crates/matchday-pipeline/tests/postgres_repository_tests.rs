//! Postgres repository tests
//!
//! Run against a real database only when `MATCHDAY_TEST_DATABASE_URL` is set;
//! otherwise every test returns early. Migrations are applied on connect.
//! Tests use league ids far outside the API range so they never touch real data.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{TimeZone, Utc};
use matchday_common::ScopeKey;
use serial_test::serial;
use sqlx::PgPool;

use matchday_pipeline::config::DatabaseConfig;
use matchday_pipeline::db::{
    self, FixtureRepository, PgFixtureRepository, PgRunRepository, PgScopeCatalog,
    RunRepository, ScopeCatalog,
};
use matchday_pipeline::error::ErrorKind;
use matchday_pipeline::models::{
    FixtureRow, NewPipelineRun, RunCompletion, RunStatus, ScopeFilter,
};

const SCOPE_A: ScopeKey = ScopeKey {
    league_id: 90_001,
    season_year: 2025,
};
const SCOPE_B: ScopeKey = ScopeKey {
    league_id: 90_002,
    season_year: 2025,
};

async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("MATCHDAY_TEST_DATABASE_URL") else {
        eprintln!("MATCHDAY_TEST_DATABASE_URL not set; skipping Postgres test");
        return None;
    };

    let pool = db::create_pool(&DatabaseConfig {
        url,
        max_connections: 2,
        min_connections: 1,
        connect_timeout_secs: 10,
    })
    .await
    .expect("failed to connect to test database");
    db::run_migrations(&pool).await.expect("migrations failed");

    for scope in [SCOPE_A, SCOPE_B] {
        sqlx::query("DELETE FROM fixtures WHERE league_id = $1")
            .bind(scope.league_id)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM pipeline_runs WHERE league_id = $1")
            .bind(scope.league_id)
            .execute(&pool)
            .await
            .unwrap();
    }

    Some(pool)
}

fn row(scope: ScopeKey, fixture_id: i64, day: Option<u32>) -> FixtureRow {
    FixtureRow {
        fixture_id,
        date: day.map(|d| Utc.with_ymd_and_hms(2025, 1, d, 15, 0, 0).unwrap()),
        timestamp: None,
        venue_id: Some(555),
        venue_name: Some("Ground".to_string()),
        status_short: Some("FT".to_string()),
        status_long: Some("Match Finished".to_string()),
        league_id: scope.league_id,
        league_name: Some("Test League".to_string()),
        season_year: scope.season_year,
        league_round: Some("Regular Season - 1".to_string()),
        home_team_id: Some(1),
        home_team_name: Some("TeamA".to_string()),
        away_team_id: Some(2),
        away_team_name: Some("TeamB".to_string()),
        goals_home: Some(2),
        goals_away: Some(1),
    }
}

// ============================================================================
// Fixtures
// ============================================================================

#[tokio::test]
#[serial]
async fn test_replace_scope_swaps_rows_and_leaves_other_scopes() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgFixtureRepository::new(pool);

    repo.replace_scope(SCOPE_A, &[row(SCOPE_A, 1, Some(10)), row(SCOPE_A, 2, Some(11))])
        .await
        .unwrap();
    repo.replace_scope(SCOPE_B, &[row(SCOPE_B, 9, Some(12))])
        .await
        .unwrap();

    let inserted = repo
        .replace_scope(SCOPE_A, &[row(SCOPE_A, 3, Some(20))])
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let a = repo.list_scope(SCOPE_A).await.unwrap();
    assert_eq!(a.iter().map(|r| r.fixture_id).collect::<Vec<_>>(), vec![3]);
    assert_eq!(repo.list_scope(SCOPE_B).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_list_scope_orders_by_date_with_undated_last() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgFixtureRepository::new(pool);

    repo.replace_scope(
        SCOPE_A,
        &[row(SCOPE_A, 5, None), row(SCOPE_A, 4, Some(20)), row(SCOPE_A, 6, Some(3))],
    )
    .await
    .unwrap();

    let ids: Vec<i64> = repo
        .list_scope(SCOPE_A)
        .await
        .unwrap()
        .iter()
        .map(|r| r.fixture_id)
        .collect();
    assert_eq!(ids, vec![6, 4, 5]);
}

#[tokio::test]
#[serial]
async fn test_replace_scope_with_empty_table_clears_scope() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgFixtureRepository::new(pool);

    repo.replace_scope(SCOPE_A, &[row(SCOPE_A, 1, Some(1))])
        .await
        .unwrap();
    assert_eq!(repo.replace_scope(SCOPE_A, &[]).await.unwrap(), 0);
    assert!(repo.list_scope(SCOPE_A).await.unwrap().is_empty());
}

// ============================================================================
// Run history
// ============================================================================

#[tokio::test]
#[serial]
async fn test_run_lifecycle() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgRunRepository::new(pool);

    let run = repo
        .create(NewPipelineRun {
            scope: Some(SCOPE_A),
            source: "test/full_pipeline".to_string(),
            started_at: Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.finished_at.is_none());

    let failed = repo
        .finish(
            run.id,
            RunCompletion {
                status: RunStatus::Failed,
                error_kind: Some(ErrorKind::Network),
                error_summary: "boom".to_string(),
                finished_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    assert_eq!(failed.status, RunStatus::Failed);
    assert_eq!(failed.error_kind, Some(ErrorKind::Network));
    assert_eq!(failed.error_summary, "boom");
    assert!(failed.finished_at.unwrap() >= failed.started_at);

    // Terminal records cannot be finished twice
    let again = repo
        .finish(
            run.id,
            RunCompletion {
                status: RunStatus::Success,
                error_kind: None,
                error_summary: String::new(),
                finished_at: Utc::now(),
            },
        )
        .await;
    assert!(again.is_err());
}

#[tokio::test]
#[serial]
async fn test_latest_successful_and_recent_filter_by_scope() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgRunRepository::new(pool);

    let mut ids = Vec::new();
    for (scope, status) in [
        (SCOPE_A, RunStatus::Success),
        (SCOPE_A, RunStatus::Failed),
        (SCOPE_B, RunStatus::Success),
    ] {
        let run = repo
            .create(NewPipelineRun {
                scope: Some(scope),
                source: "test".to_string(),
                started_at: Utc::now(),
            })
            .await
            .unwrap();
        repo.finish(
            run.id,
            RunCompletion {
                status,
                error_kind: None,
                error_summary: String::new(),
                finished_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        ids.push(run.id);
    }

    let latest = repo
        .latest_successful(ScopeFilter::from(SCOPE_A))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, ids[0]);

    let recent = repo.recent(ScopeFilter::from(SCOPE_A), 10).await.unwrap();
    assert_eq!(recent.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[1], ids[0]]);

    let limited = repo.recent(ScopeFilter::from(SCOPE_A), 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
#[serial]
async fn test_catalog_includes_seeded_scope() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let catalog = PgScopeCatalog::new(pool);

    let leagues = catalog.leagues().await.unwrap();
    assert!(leagues.iter().any(|l| l.id == 39 && l.name == "Premier League"));

    let seasons = catalog.seasons().await.unwrap();
    assert!(seasons.iter().any(|s| s.api_year == 2025 && s.display == "2025/26"));
    assert!(seasons.windows(2).all(|w| w[0].api_year >= w[1].api_year));
}
