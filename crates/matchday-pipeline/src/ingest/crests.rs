//! Team crest sync
//!
//! Best-effort side task of ingest: every team referenced in a fixtures
//! response gets its crest image stored once under `crests/team_{id}.png`.
//! Nothing in here returns an error; per-team failures are logged and skipped.

use matchday_common::ArtifactKey;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::storage::{ObjectStore, CONTENT_TYPE_PNG};
use crate::transform::coerce_int;

/// Team identity and crest URL as found in the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamCrest {
    pub team_id: i64,
    pub logo_url: String,
}

/// Unique teams from `teams.home` / `teams.away`, in first-seen order
pub fn extract_teams(raw: &Value) -> Vec<TeamCrest> {
    let Some(items) = raw.get("response").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut teams = Vec::new();
    for item in items {
        for side in ["home", "away"] {
            let Some(team) = item.get("teams").and_then(|t| t.get(side)) else {
                continue;
            };
            let Some(team_id) = coerce_int(team.get("id")) else {
                continue;
            };
            if !seen.insert(team_id) {
                continue;
            }
            let logo_url = team
                .get("logo")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| team.get("crest").and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();
            teams.push(TeamCrest { team_id, logo_url });
        }
    }
    teams
}

/// Per-call counters, mostly for logs and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrestSyncReport {
    pub stored: usize,
    pub already_present: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum CrestOutcome {
    Stored,
    AlreadyPresent,
    Skipped,
}

pub struct CrestSync {
    client: Client,
    store: Arc<dyn ObjectStore>,
}

impl CrestSync {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, store })
    }

    pub async fn sync_from_response(&self, raw: &Value) -> CrestSyncReport {
        let mut report = CrestSyncReport::default();

        let teams = extract_teams(raw);
        if teams.is_empty() {
            return report;
        }

        if let Err(e) = self.store.ensure_container().await {
            warn!(error = %e, "Crest sync skipped: storage unavailable");
            report.failed = teams.len();
            return report;
        }

        for team in &teams {
            match self.ensure_crest(team).await {
                Ok(CrestOutcome::Stored) => report.stored += 1,
                Ok(CrestOutcome::AlreadyPresent) => report.already_present += 1,
                Ok(CrestOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(team_id = team.team_id, error = %e, "Failed to store crest");
                    report.failed += 1;
                }
            }
        }

        info!(
            stored = report.stored,
            already_present = report.already_present,
            skipped = report.skipped,
            failed = report.failed,
            "Crest sync finished"
        );
        report
    }

    async fn ensure_crest(&self, team: &TeamCrest) -> PipelineResult<CrestOutcome> {
        let key = ArtifactKey::crest(team.team_id);
        if self.store.exists(key.as_str()).await? {
            debug!(%key, "Crest already exists");
            return Ok(CrestOutcome::AlreadyPresent);
        }

        if !team.logo_url.trim().starts_with("http") {
            debug!(team_id = team.team_id, "Skipping invalid logo URL");
            return Ok(CrestOutcome::Skipped);
        }

        let response = self.client.get(team.logo_url.trim()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                url: team.logo_url.clone(),
            });
        }

        let data = response.bytes().await?;
        if data.is_empty() {
            return Ok(CrestOutcome::Skipped);
        }

        self.store
            .put(key.as_str(), data.to_vec(), CONTENT_TYPE_PNG)
            .await?;
        info!(team_id = team.team_id, %key, "Stored crest");
        Ok(CrestOutcome::Stored)
    }
}
