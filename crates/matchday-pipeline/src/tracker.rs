//! Run tracker
//!
//! Wraps a unit of work in an audit record: `RUNNING` before the work starts,
//! then exactly one transition to `SUCCESS` or `FAILED`. Failures are recorded
//! with their [`ErrorKind`] and message and handed back to the caller
//! unchanged; the tracker never swallows an error.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use matchday_common::ScopeKey;
//! # use matchday_pipeline::{db::MemoryRunRepository, tracker::RunTracker};
//! # async fn demo() -> matchday_pipeline::error::PipelineResult<()> {
//! let tracker = RunTracker::new(Arc::new(MemoryRunRepository::new()));
//! let tracked = tracker
//!     .run_with_tracking(Some(ScopeKey::new(39, 2025)), "cli", || async { Ok(42) })
//!     .await?;
//! assert_eq!(tracked.value, 42);
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use matchday_common::ScopeKey;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::RunRepository;
use crate::error::{ErrorKind, PipelineResult};
use crate::models::{NewPipelineRun, PipelineRun, RunCompletion, RunStatus, ScopeFilter};

/// Finalized run record plus whatever the work returned
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    pub run: PipelineRun,
    pub value: T,
}

#[derive(Clone)]
pub struct RunTracker {
    runs: Arc<dyn RunRepository>,
}

impl RunTracker {
    pub fn new(runs: Arc<dyn RunRepository>) -> Self {
        Self { runs }
    }

    /// Create a `RUNNING` record
    pub async fn begin(&self, scope: Option<ScopeKey>, source: &str) -> PipelineResult<PipelineRun> {
        let run = self
            .runs
            .create(NewPipelineRun {
                scope,
                source: source.to_string(),
                started_at: Utc::now(),
            })
            .await?;
        debug!(run_id = run.id, scope = %run.describe_scope(), source, "Run started");
        Ok(run)
    }

    /// Apply the terminal status; `error` fills kind and summary
    pub async fn finish(
        &self,
        run: &PipelineRun,
        status: RunStatus,
        error: Option<(ErrorKind, String)>,
    ) -> PipelineResult<PipelineRun> {
        let (error_kind, error_summary) = match error {
            Some((kind, summary)) => (Some(kind), summary),
            None => (None, String::new()),
        };

        let finished = self
            .runs
            .finish(
                run.id,
                RunCompletion {
                    status,
                    error_kind,
                    error_summary,
                    finished_at: Utc::now(),
                },
            )
            .await?;
        debug!(run_id = finished.id, status = %finished.status, "Run finished");
        Ok(finished)
    }

    /// Run `work` inside a tracked record.
    ///
    /// On success the record is marked `SUCCESS` and returned with the work's
    /// value. On failure it is marked `FAILED` with the error's kind and
    /// message, and the original error is returned.
    pub async fn run_with_tracking<T, F, Fut>(
        &self,
        scope: Option<ScopeKey>,
        source: &str,
        work: F,
    ) -> PipelineResult<Tracked<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let run = self.begin(scope, source).await?;

        match work().await {
            Ok(value) => {
                let run = self.finish(&run, RunStatus::Success, None).await?;
                Ok(Tracked { run, value })
            }
            Err(err) => {
                let failure = (err.kind(), err.to_string());
                if let Err(record_err) = self.finish(&run, RunStatus::Failed, Some(failure)).await {
                    warn!(run_id = run.id, error = %record_err, "Failed to record run failure");
                }
                Err(err)
            }
        }
    }

    /// Most recently started successful run matching `filter`
    pub async fn latest_successful(
        &self,
        filter: impl Into<ScopeFilter>,
    ) -> PipelineResult<Option<PipelineRun>> {
        self.runs.latest_successful(filter.into()).await
    }

    pub async fn recent(&self, filter: ScopeFilter, limit: i64) -> PipelineResult<Vec<PipelineRun>> {
        self.runs.recent(filter, limit).await
    }
}
