//! Transform stage: raw API response -> cleaned fixture table
//!
//! [`flatten`] never fails: missing nested objects become nulls and values
//! that do not coerce to the column type become nulls too. [`clean`] then
//! removes exact duplicates and rows without a fixture id.

use chrono::{DateTime, NaiveDateTime, Utc};
use matchday_common::{ArtifactKey, ScopeKey};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{FixtureRecord, FixtureTable};
use crate::storage::ObjectStore;

pub mod columnar;
pub mod export;

pub use export::{ExportOptions, ExportPaths};

// ============================================================================
// Coercion
// ============================================================================

fn field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .filter(|v| !v.is_null())
}

/// Integral numbers and numeric strings; anything else is null
pub(crate) fn coerce_int(value: Option<&Value>) -> Option<i64> {
    fn from_float(f: f64) -> Option<i64> {
        (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
    }

    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(from_float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(from_float))
        }
        _ => None,
    }
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// RFC 3339 with offset, or a naive ISO datetime read as UTC
fn coerce_datetime(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let s = value?.as_str()?.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

// ============================================================================
// Flatten / clean
// ============================================================================

fn flatten_item(item: &Value) -> FixtureRecord {
    let int = |path: &[&str]| coerce_int(field(item, path));
    let text = |path: &[&str]| coerce_text(field(item, path));

    FixtureRecord {
        fixture_id: int(&["fixture", "id"]),
        date: coerce_datetime(field(item, &["fixture", "date"])),
        timestamp: int(&["fixture", "timestamp"]),
        venue_id: int(&["fixture", "venue", "id"]),
        venue_name: text(&["fixture", "venue", "name"]),
        status_short: text(&["fixture", "status", "short"]),
        status_long: text(&["fixture", "status", "long"]),
        league_id: int(&["league", "id"]),
        league_name: text(&["league", "name"]),
        league_season: int(&["league", "season"]),
        league_round: text(&["league", "round"]),
        home_team_id: int(&["teams", "home", "id"]),
        home_team_name: text(&["teams", "home", "name"]),
        away_team_id: int(&["teams", "away", "id"]),
        away_team_name: text(&["teams", "away", "name"]),
        goals_home: int(&["goals", "home"]),
        goals_away: int(&["goals", "away"]),
    }
}

/// One row per element of the response's `response` array
pub fn flatten(raw: &Value) -> FixtureTable {
    raw.get("response")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(flatten_item).collect())
        .unwrap_or_default()
}

/// Drop exact duplicates (first occurrence wins), then rows with a null
/// fixture id. Order of the surviving rows is preserved.
pub fn clean(table: &[FixtureRecord]) -> FixtureTable {
    let mut seen = HashSet::with_capacity(table.len());
    table
        .iter()
        .filter(|row| seen.insert(*row))
        .filter(|row| row.fixture_id.is_some())
        .cloned()
        .collect()
}

// ============================================================================
// Stage
// ============================================================================

/// Where to read a raw artifact from; defaults to the stage's store and the
/// scope's raw key
#[derive(Clone, Default)]
pub struct RawLocation {
    pub store: Option<Arc<dyn ObjectStore>>,
    pub key: Option<ArtifactKey>,
}

impl RawLocation {
    pub fn with_key(key: ArtifactKey) -> Self {
        Self {
            store: None,
            key: Some(key),
        }
    }

    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store: Some(store),
            key: None,
        }
    }
}

pub struct TransformStage {
    store: Arc<dyn ObjectStore>,
}

impl TransformStage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn read_raw(&self, scope: ScopeKey, location: &RawLocation) -> PipelineResult<Value> {
        let store = location.store.as_ref().unwrap_or(&self.store);
        let key = location.key.clone().unwrap_or_else(|| ArtifactKey::raw(scope));

        let data = store.get(key.as_str()).await?.ok_or_else(|| {
            PipelineError::Storage(format!(
                "raw artifact {}/{} not found",
                store.container(),
                key
            ))
        })?;
        debug!(%key, size = data.len(), "Read raw artifact");

        Ok(serde_json::from_slice(&data)?)
    }

    /// Read, flatten and clean; optionally also write offline exports
    #[instrument(skip(self, location, export), fields(league = scope.league_id, season = scope.season_year))]
    pub async fn run_transform(
        &self,
        scope: ScopeKey,
        location: &RawLocation,
        export: Option<&ExportOptions>,
    ) -> PipelineResult<FixtureTable> {
        let raw = self.read_raw(scope, location).await?;
        let flat = flatten(&raw);
        let table = clean(&flat);

        info!(
            flattened = flat.len(),
            kept = table.len(),
            "Transformed fixtures"
        );

        if let Some(options) = export {
            export::write_exports(&table, options).await?;
        }

        Ok(table)
    }
}
