//! Pipeline orchestrator
//!
//! Drives every configured `(league, season)` pair through the stages while
//! holding the global pipeline lock:
//!
//! - full run: ingest, then transform -> load -> publish as one tracked unit
//! - rebuild: load the processed snapshot if there is one, otherwise
//!   transform -> load -> publish from the raw artifact, otherwise skip
//!
//! Pairs run one at a time in catalog order (leagues x seasons). A failing
//! pair is logged and recorded; the loop moves on. Only fatal errors
//! (configuration, lock) abort the run. Each invocation also writes one
//! scope-less aggregate run record.

use matchday_common::{ArtifactKey, ScopeKey};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cache::{NoopCache, PresentationCache};
use crate::config::DEFAULT_LOCK_STALE_SECS;
use crate::db::{FixtureRepository, RunRepository, ScopeCatalog};
use crate::error::{ErrorKind, PipelineError, PipelineResult};
use crate::ingest::{CrestSync, FixtureSource, IngestStage};
use crate::load::LoadStage;
use crate::lock::PipelineLock;
use crate::models::{FixtureTable, PipelineRun, RunStatus, ScopeFilter};
use crate::processed::ProcessedPublisher;
use crate::storage::ObjectStore;
use crate::tracker::RunTracker;
use crate::transform::{ExportOptions, RawLocation, TransformStage};

/// Source tag used when the caller does not name a trigger
pub const DEFAULT_TRIGGER: &str = "cli";

// ============================================================================
// Outcomes
// ============================================================================

/// Result of anything that has to take the pipeline lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome<T = RunSummary> {
    /// Another invocation holds the lock; nothing was changed
    AlreadyRunning,
    Completed(T),
}

impl<T> PipelineOutcome<T> {
    pub fn is_already_running(&self) -> bool {
        matches!(self, PipelineOutcome::AlreadyRunning)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            PipelineOutcome::Completed(value) => Some(value),
            PipelineOutcome::AlreadyRunning => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    Rebuild,
}

impl RunMode {
    fn tag(&self) -> &'static str {
        match self {
            RunMode::Full => "full_pipeline",
            RunMode::Rebuild => "rebuild",
        }
    }
}

/// Where a loaded table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Freshly ingested from the API
    Api,
    /// Cached processed snapshot, loaded as-is
    Processed,
    /// Reprocessed from the stored raw response
    Raw,
}

impl LoadSource {
    fn tag(&self) -> &'static str {
        match self {
            LoadSource::Api => "full_pipeline",
            LoadSource::Processed => "rebuild_from_processed",
            LoadSource::Raw => "rebuild_from_raw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeResult {
    Loaded { rows: u64, from: LoadSource },
    /// Nothing stored for the scope (rebuild only)
    Skipped,
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeReport {
    pub scope: ScopeKey,
    pub result: ScopeResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: RunMode,
    pub source: String,
    /// Aggregate status across every attempted pair
    pub status: RunStatus,
    pub run_id: i64,
    pub scopes: Vec<ScopeReport>,
}

impl RunSummary {
    fn count(&self, f: impl Fn(&ScopeResult) -> bool) -> usize {
        self.scopes.iter().filter(|r| f(&r.result)).count()
    }

    pub fn loaded(&self) -> usize {
        self.count(|r| matches!(r, ScopeResult::Loaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|r| matches!(r, ScopeResult::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, ScopeResult::Failed { .. }))
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{}: nothing to do (no leagues or seasons configured)", self.source);
        }
        write!(
            f,
            "{} {}: {} loaded, {} failed, {} skipped",
            self.source,
            self.status,
            self.loaded(),
            self.failed(),
            self.skipped()
        )
    }
}

/// Aggregate status: all attempted pairs failed -> FAILED, some -> PARTIAL_SUCCESS
fn aggregate_status(reports: &[ScopeReport]) -> RunStatus {
    let attempted = reports
        .iter()
        .filter(|r| r.result != ScopeResult::Skipped)
        .count();
    let failed = reports
        .iter()
        .filter(|r| matches!(r.result, ScopeResult::Failed { .. }))
        .count();

    if failed == 0 {
        RunStatus::Success
    } else if failed == attempted {
        RunStatus::Failed
    } else {
        RunStatus::PartialSuccess
    }
}

fn aggregate_error(reports: &[ScopeReport]) -> Option<(ErrorKind, String)> {
    let failures: Vec<(ScopeKey, ErrorKind, &str)> = reports
        .iter()
        .filter_map(|r| match &r.result {
            ScopeResult::Failed { kind, message } => Some((r.scope, *kind, message.as_str())),
            _ => None,
        })
        .collect();

    let (_, first_kind, _) = *failures.first()?;
    let details: Vec<String> = failures
        .iter()
        .map(|(scope, _, message)| format!("{}: {}", scope, message))
        .collect();

    Some((
        first_kind,
        format!(
            "{} of {} scopes failed; {}",
            failures.len(),
            reports.len(),
            details.join("; ")
        ),
    ))
}

/// Lock and run-history snapshot for operators
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    pub lock_path: PathBuf,
    pub lock_held: bool,
    /// Diagnostic only; a stale lock is never broken automatically
    pub lock_stale: bool,
    pub lock_age: Option<Duration>,
    pub latest_success: Option<PipelineRun>,
    pub recent: Vec<PipelineRun>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Collaborators the orchestrator is built from
pub struct PipelineDeps {
    pub store: Arc<dyn ObjectStore>,
    pub source: Arc<dyn FixtureSource>,
    pub fixtures: Arc<dyn FixtureRepository>,
    pub runs: Arc<dyn RunRepository>,
    pub catalog: Arc<dyn ScopeCatalog>,
    pub cache: Arc<dyn PresentationCache>,
    pub crests: Option<CrestSync>,
}

impl PipelineDeps {
    /// Dependencies with no cache and no crest sync
    pub fn new(
        store: Arc<dyn ObjectStore>,
        source: Arc<dyn FixtureSource>,
        fixtures: Arc<dyn FixtureRepository>,
        runs: Arc<dyn RunRepository>,
        catalog: Arc<dyn ScopeCatalog>,
    ) -> Self {
        Self {
            store,
            source,
            fixtures,
            runs,
            catalog,
            cache: Arc::new(NoopCache),
            crests: None,
        }
    }
}

pub struct PipelineOrchestrator {
    lock: PipelineLock,
    lock_stale_after: Duration,
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn ScopeCatalog>,
    cache: Arc<dyn PresentationCache>,
    ingest: IngestStage,
    transform: TransformStage,
    loader: LoadStage,
    publisher: ProcessedPublisher,
    tracker: RunTracker,
}

impl PipelineOrchestrator {
    pub fn new(lock: PipelineLock, deps: PipelineDeps) -> Self {
        let mut ingest = IngestStage::new(deps.source, deps.store.clone());
        if let Some(crests) = deps.crests {
            ingest = ingest.with_crests(crests);
        }

        Self {
            lock,
            lock_stale_after: Duration::from_secs(DEFAULT_LOCK_STALE_SECS),
            transform: TransformStage::new(deps.store.clone()),
            publisher: ProcessedPublisher::new(deps.store.clone()),
            loader: LoadStage::new(deps.fixtures),
            tracker: RunTracker::new(deps.runs),
            store: deps.store,
            catalog: deps.catalog,
            cache: deps.cache,
            ingest,
        }
    }

    pub fn with_lock_stale_after(mut self, max_age: Duration) -> Self {
        self.lock_stale_after = max_age;
        self
    }

    /// Take the lock, run `work`, release on every exit path
    async fn locked<T, F, Fut>(&self, work: F) -> PipelineResult<PipelineOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        if !self.lock.acquire(true)? {
            error!(
                path = %self.lock.path().display(),
                "Lock file exists; another run may be in progress. Remove it to force."
            );
            return Ok(PipelineOutcome::AlreadyRunning);
        }
        let _guard = self.lock.scoped();

        work().await.map(PipelineOutcome::Completed)
    }

    /// Ingest, transform, load and publish every configured pair
    pub async fn run_full(&self, trigger: &str) -> PipelineResult<PipelineOutcome> {
        // A missing API key means the pipeline does not start at all
        self.ingest.ensure_configured()?;
        self.locked(|| self.execute(RunMode::Full, trigger)).await
    }

    /// Rebuild the relational store from object storage without API calls
    pub async fn rebuild(&self, trigger: &str) -> PipelineResult<PipelineOutcome> {
        self.locked(|| self.execute(RunMode::Rebuild, trigger)).await
    }

    /// Ingest a single scope under the pipeline lock (untracked)
    pub async fn ingest_scope(&self, scope: ScopeKey) -> PipelineResult<PipelineOutcome<ArtifactKey>> {
        self.ingest.ensure_configured()?;
        self.locked(|| self.ingest.run_ingest(scope)).await
    }

    /// Transform a single scope's raw artifact into offline export files
    pub async fn export_scope(
        &self,
        scope: ScopeKey,
        options: &ExportOptions,
    ) -> PipelineResult<PipelineOutcome<FixtureTable>> {
        let location = RawLocation::default();
        self.locked(|| self.transform.run_transform(scope, &location, Some(options)))
            .await
    }

    pub async fn status(&self, filter: ScopeFilter, history: i64) -> PipelineResult<PipelineStatus> {
        Ok(PipelineStatus {
            lock_path: self.lock.path().to_path_buf(),
            lock_held: self.lock.is_held(),
            lock_stale: self.lock.is_stale(self.lock_stale_after),
            lock_age: self.lock.age(),
            latest_success: self.tracker.latest_successful(filter).await?,
            recent: self.tracker.recent(filter, history).await?,
        })
    }

    async fn scopes(&self) -> PipelineResult<Vec<ScopeKey>> {
        let leagues = self.catalog.leagues().await?;
        let seasons = self.catalog.seasons().await?;

        Ok(leagues
            .iter()
            .flat_map(|league| {
                seasons
                    .iter()
                    .map(move |season| ScopeKey::new(league.id, season.api_year))
            })
            .collect())
    }

    async fn execute(&self, mode: RunMode, trigger: &str) -> PipelineResult<RunSummary> {
        let source = format!("{}/{}", trigger, mode.tag());
        let aggregate = self.tracker.begin(None, &source).await?;
        info!(run_id = aggregate.id, %source, "Pipeline run started");

        let reports = match self.execute_scopes(mode, trigger).await {
            Ok(reports) => reports,
            Err(e) => {
                error!(run_id = aggregate.id, error = %e, "Pipeline run aborted");
                let failure = Some((e.kind(), e.to_string()));
                if let Err(record_err) = self.tracker.finish(&aggregate, RunStatus::Failed, failure).await {
                    warn!(error = %record_err, "Failed to record aborted run");
                }
                return Err(e);
            }
        };

        if !reports.is_empty() {
            self.clear_cache().await;
        }

        let status = aggregate_status(&reports);
        let run = self
            .tracker
            .finish(&aggregate, status, aggregate_error(&reports))
            .await?;

        let summary = RunSummary {
            mode,
            source,
            status,
            run_id: run.id,
            scopes: reports,
        };
        info!(
            run_id = summary.run_id,
            status = %summary.status,
            loaded = summary.loaded(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "Pipeline run completed"
        );
        Ok(summary)
    }

    async fn execute_scopes(&self, mode: RunMode, trigger: &str) -> PipelineResult<Vec<ScopeReport>> {
        let scopes = self.scopes().await?;
        if scopes.is_empty() {
            warn!("No League or Season configured; nothing to do");
            return Ok(Vec::new());
        }

        let mut reports = Vec::with_capacity(scopes.len());
        for scope in scopes {
            info!(%scope, "Processing scope");
            let outcome = match mode {
                RunMode::Full => self.full_scope(scope, trigger).await,
                RunMode::Rebuild => self.rebuild_scope(scope, trigger).await,
            };
            let result = match outcome {
                Ok(result) => result,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(%scope, error = %e, "Pipeline failed for scope");
                    ScopeResult::from(&e)
                }
            };
            reports.push(ScopeReport { scope, result });
        }
        Ok(reports)
    }

    async fn full_scope(&self, scope: ScopeKey, trigger: &str) -> PipelineResult<ScopeResult> {
        // Outside the tracked unit so raw data lands even if later stages fail
        self.ingest.run_ingest(scope).await?;
        self.transform_load_publish(scope, trigger, LoadSource::Api).await
    }

    async fn rebuild_scope(&self, scope: ScopeKey, trigger: &str) -> PipelineResult<ScopeResult> {
        if let Some(table) = self.publisher.load_from_store(scope).await.filter(|t| !t.is_empty()) {
            info!(%scope, rows = table.len(), "Loading from processed snapshot");
            let source = format!("{}/{}", trigger, LoadSource::Processed.tag());
            let tracked = self
                .tracker
                .run_with_tracking(Some(scope), &source, || self.loader.load(&table, scope))
                .await?;
            return Ok(ScopeResult::Loaded {
                rows: tracked.value,
                from: LoadSource::Processed,
            });
        }

        let raw_key = ArtifactKey::raw(scope);
        if !self.store.exists(raw_key.as_str()).await? {
            warn!(%scope, "No raw or processed data; skipping");
            return Ok(ScopeResult::Skipped);
        }

        info!(%scope, key = %raw_key, "Rebuilding from raw");
        self.transform_load_publish(scope, trigger, LoadSource::Raw).await
    }

    async fn transform_load_publish(
        &self,
        scope: ScopeKey,
        trigger: &str,
        from: LoadSource,
    ) -> PipelineResult<ScopeResult> {
        let source = format!("{}/{}", trigger, from.tag());
        let tracked = self
            .tracker
            .run_with_tracking(Some(scope), &source, || async {
                let table = self
                    .transform
                    .run_transform(scope, &RawLocation::default(), None)
                    .await?;
                let rows = self.loader.load(&table, scope).await?;
                self.publisher.upload(&table, scope).await?;
                Ok(rows)
            })
            .await?;

        Ok(ScopeResult::Loaded {
            rows: tracked.value,
            from,
        })
    }

    /// Best-effort; failures are logged and swallowed
    async fn clear_cache(&self) {
        if let Err(e) = self.cache.clear().await {
            warn!(error = %e, "Failed to clear presentation cache");
        }
    }
}

impl From<&PipelineError> for ScopeResult {
    fn from(err: &PipelineError) -> Self {
        ScopeResult::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn report(league: i32, result: ScopeResult) -> ScopeReport {
        ScopeReport {
            scope: ScopeKey::new(league, 2025),
            result,
        }
    }

    fn failed(message: &str) -> ScopeResult {
        ScopeResult::Failed {
            kind: ErrorKind::Network,
            message: message.to_string(),
        }
    }

    fn loaded() -> ScopeResult {
        ScopeResult::Loaded {
            rows: 10,
            from: LoadSource::Api,
        }
    }

    #[test]
    fn test_aggregate_status() {
        assert_eq!(aggregate_status(&[]), RunStatus::Success);
        assert_eq!(
            aggregate_status(&[report(39, loaded()), report(140, ScopeResult::Skipped)]),
            RunStatus::Success
        );
        assert_eq!(
            aggregate_status(&[report(39, loaded()), report(140, failed("503"))]),
            RunStatus::PartialSuccess
        );
        assert_eq!(
            aggregate_status(&[report(39, failed("503")), report(140, ScopeResult::Skipped)]),
            RunStatus::Failed
        );
    }

    #[test]
    fn test_aggregate_error_lists_failed_scopes() {
        let reports = [report(39, loaded()), report(140, failed("status 503"))];
        let (kind, summary) = aggregate_error(&reports).unwrap();
        assert_eq!(kind, ErrorKind::Network);
        assert_eq!(summary, "1 of 2 scopes failed; league=140 season=2025: status 503");
        assert!(aggregate_error(&[report(39, loaded())]).is_none());
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            mode: RunMode::Full,
            source: "cli/full_pipeline".into(),
            status: RunStatus::PartialSuccess,
            run_id: 1,
            scopes: vec![report(39, loaded()), report(140, failed("x"))],
        };
        assert_eq!(
            summary.to_string(),
            "cli/full_pipeline PARTIAL_SUCCESS: 1 loaded, 1 failed, 0 skipped"
        );
    }
}
