//! Processed-artifact publisher
//!
//! Cleaned tables are cached in object storage as Parquet so a rebuild can
//! reload the relational store without reprocessing raw responses.

use matchday_common::{ArtifactKey, ScopeKey};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::PipelineResult;
use crate::models::{FixtureRecord, FixtureTable};
use crate::storage::{ObjectStore, CONTENT_TYPE_PARQUET};
use crate::transform::columnar::{decode_parquet, encode_parquet};

pub struct ProcessedPublisher {
    store: Arc<dyn ObjectStore>,
}

impl ProcessedPublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, table), fields(league = scope.league_id, season = scope.season_year, rows = table.len()))]
    pub async fn upload(&self, table: &[FixtureRecord], scope: ScopeKey) -> PipelineResult<ArtifactKey> {
        let key = ArtifactKey::processed(scope);
        let body = encode_parquet(table)?;

        self.store.ensure_container().await?;
        let stored = self.store.put(key.as_str(), body, CONTENT_TYPE_PARQUET).await?;

        info!(%key, size = stored.size, "Uploaded processed snapshot");
        Ok(key)
    }

    /// Cached table for the scope.
    ///
    /// `None` when the object is absent or cannot be read or decoded; callers
    /// treat that as a cache miss.
    pub async fn load_from_store(&self, scope: ScopeKey) -> Option<FixtureTable> {
        let key = ArtifactKey::processed(scope);

        let data = match self.store.get(key.as_str()).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(%key, "No processed snapshot");
                return None;
            }
            Err(e) => {
                debug!(%key, error = %e, "Processed snapshot unreadable");
                return None;
            }
        };

        match decode_parquet(data) {
            Ok(table) => Some(table),
            Err(e) => {
                debug!(%key, error = %e, "Processed snapshot could not be decoded");
                None
            }
        }
    }
}
