//! Domain and database models

use chrono::{DateTime, Utc};
use matchday_common::ScopeKey;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{ErrorKind, PipelineError};

// ============================================================================
// Fixtures
// ============================================================================

/// One flattened fixture, as produced by the transform stage.
///
/// Every column is nullable: missing nested fields in the API payload map to
/// `None`, and [`clean`](crate::transform::clean) is what drops rows without
/// a `fixture_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixtureRecord {
    pub fixture_id: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    pub timestamp: Option<i64>,
    pub venue_id: Option<i64>,
    pub venue_name: Option<String>,
    pub status_short: Option<String>,
    pub status_long: Option<String>,
    pub league_id: Option<i64>,
    pub league_name: Option<String>,
    pub league_season: Option<i64>,
    pub league_round: Option<String>,
    pub home_team_id: Option<i64>,
    pub home_team_name: Option<String>,
    pub away_team_id: Option<i64>,
    pub away_team_name: Option<String>,
    pub goals_home: Option<i64>,
    pub goals_away: Option<i64>,
}

/// Tabular form of a scope's fixtures; row order is significant
pub type FixtureTable = Vec<FixtureRecord>;

/// Persisted fixture (maps to the `fixtures` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FixtureRow {
    pub fixture_id: i64,
    pub date: Option<DateTime<Utc>>,
    pub timestamp: Option<i64>,
    pub venue_id: Option<i64>,
    pub venue_name: Option<String>,
    pub status_short: Option<String>,
    pub status_long: Option<String>,
    pub league_id: i32,
    pub league_name: Option<String>,
    pub season_year: i32,
    pub league_round: Option<String>,
    pub home_team_id: Option<i64>,
    pub home_team_name: Option<String>,
    pub away_team_id: Option<i64>,
    pub away_team_name: Option<String>,
    pub goals_home: Option<i64>,
    pub goals_away: Option<i64>,
}

impl FixtureRow {
    /// Map a cleaned record into the scope being loaded.
    ///
    /// Returns `None` for records without a fixture id. The scope key is
    /// authoritative for `league_id`/`season_year`, so a later replace of the
    /// same scope always removes every row this one inserted.
    pub fn from_record(record: &FixtureRecord, scope: ScopeKey) -> Option<Self> {
        Some(Self {
            fixture_id: record.fixture_id?,
            date: record.date,
            timestamp: record.timestamp,
            venue_id: record.venue_id,
            venue_name: record.venue_name.clone(),
            status_short: record.status_short.clone(),
            status_long: record.status_long.clone(),
            league_id: scope.league_id,
            league_name: record.league_name.clone(),
            season_year: scope.season_year,
            league_round: record.league_round.clone(),
            home_team_id: record.home_team_id,
            home_team_name: record.home_team_name.clone(),
            away_team_id: record.away_team_id,
            away_team_name: record.away_team_name.clone(),
            goals_home: record.goals_home,
            goals_away: record.goals_away,
        })
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Configured league (API league id and display name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct League {
    pub id: i32,
    pub name: String,
    pub display_order: i16,
}

/// Configured season by API year, e.g. 2025 -> "2025/26"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Season {
    pub api_year: i32,
    pub display: String,
    pub display_order: i16,
}

// ============================================================================
// Pipeline runs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    PartialSuccess,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
            RunStatus::PartialSuccess => "PARTIAL_SUCCESS",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCESS" => Ok(RunStatus::Success),
            "FAILED" => Ok(RunStatus::Failed),
            "PARTIAL_SUCCESS" => Ok(RunStatus::PartialSuccess),
            other => Err(PipelineError::Parse(format!("unknown run status '{}'", other))),
        }
    }
}

/// Audit record of one tracked unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: i64,
    pub league_id: Option<i32>,
    pub season_year: Option<i32>,
    pub source: String,
    pub status: RunStatus,
    pub error_kind: Option<ErrorKind>,
    /// Empty unless the run failed
    pub error_summary: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn scope(&self) -> Option<ScopeKey> {
        match (self.league_id, self.season_year) {
            (Some(league), Some(season)) => Some(ScopeKey::new(league, season)),
            _ => None,
        }
    }

    pub fn describe_scope(&self) -> String {
        let mut parts = Vec::new();
        if let Some(league) = self.league_id {
            parts.push(format!("league={}", league));
        }
        if let Some(season) = self.season_year {
            parts.push(format!("season={}", season));
        }
        if parts.is_empty() {
            "global".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Raw `pipeline_runs` row; status and kind are stored as text
#[derive(Debug, Clone, FromRow)]
pub(crate) struct PipelineRunRow {
    pub id: i64,
    pub league_id: Option<i32>,
    pub season_year: Option<i32>,
    pub source: String,
    pub status: String,
    pub error_kind: Option<String>,
    pub error_summary: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<PipelineRunRow> for PipelineRun {
    type Error = PipelineError;

    fn try_from(row: PipelineRunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            league_id: row.league_id,
            season_year: row.season_year,
            source: row.source,
            status: row.status.parse()?,
            error_kind: row.error_kind.as_deref().map(str::parse).transpose()?,
            error_summary: row.error_summary,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

/// Values for a freshly started run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPipelineRun {
    pub scope: Option<ScopeKey>,
    pub source: String,
    pub started_at: DateTime<Utc>,
}

/// Terminal transition applied exactly once to a running record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub error_kind: Option<ErrorKind>,
    pub error_summary: String,
    pub finished_at: DateTime<Utc>,
}

/// Filter for run history queries; `None` fields match anything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    pub league_id: Option<i32>,
    pub season_year: Option<i32>,
}

impl ScopeFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matches(&self, run: &PipelineRun) -> bool {
        self.league_id.map_or(true, |l| run.league_id == Some(l))
            && self.season_year.map_or(true, |s| run.season_year == Some(s))
    }
}

impl From<ScopeKey> for ScopeFilter {
    fn from(scope: ScopeKey) -> Self {
        Self {
            league_id: Some(scope.league_id),
            season_year: Some(scope.season_year),
        }
    }
}
