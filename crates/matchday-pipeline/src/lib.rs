//! Matchday Pipeline Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Football fixtures pipeline: pulls fixtures per `(league, season)` from
//! API-Football, stages raw and processed artifacts in S3-compatible storage,
//! and loads a cleaned table into Postgres for the dashboard.
//!
//! # Overview
//!
//! - **Ingest**: paginated API fetch, raw JSON artifact, best-effort crest sync
//! - **Transform**: flatten nested fixtures into rows, then deduplicate and drop
//!   rows without an id
//! - **Load**: replace every row for a scope inside one transaction
//! - **Publish**: Parquet snapshot used by storage-only rebuilds
//! - **Run tracking**: an audit record per unit of work, with a tagged error kind
//! - **Lock**: a marker file that keeps two invocations from overlapping
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use matchday_pipeline::{
//!     config::PipelineConfig,
//!     db::{MemoryFixtureRepository, MemoryRunRepository, StaticCatalog},
//!     ingest::ApiFootballClient,
//!     lock::PipelineLock,
//!     orchestrator::{PipelineDeps, PipelineOrchestrator},
//!     storage::MemoryStore,
//! };
//!
//! # async fn demo() -> matchday_pipeline::error::PipelineResult<()> {
//! let config = PipelineConfig::load()?;
//! let deps = PipelineDeps::new(
//!     Arc::new(MemoryStore::new("football")),
//!     Arc::new(ApiFootballClient::new(config.api.clone())?),
//!     Arc::new(MemoryFixtureRepository::new()),
//!     Arc::new(MemoryRunRepository::new()),
//!     Arc::new(StaticCatalog::from_ids(&[39], &[2025])),
//! );
//! let orchestrator = PipelineOrchestrator::new(PipelineLock::new(config.lock_path()), deps);
//! let outcome = orchestrator.run_full("cli").await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod load;
pub mod lock;
pub mod models;
pub mod orchestrator;
pub mod processed;
pub mod storage;
pub mod tracker;
pub mod transform;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use orchestrator::{PipelineOrchestrator, PipelineOutcome, RunSummary};
