//! Ingest stage: external API -> raw artifact in object storage

use matchday_common::{ArtifactKey, ScopeKey};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::PipelineResult;
use crate::storage::{ObjectStore, CONTENT_TYPE_JSON};

pub mod client;
pub mod crests;

pub use client::{ApiFootballClient, FixtureSource};
pub use crests::{CrestSync, CrestSyncReport};

pub struct IngestStage {
    source: Arc<dyn FixtureSource>,
    store: Arc<dyn ObjectStore>,
    crests: Option<CrestSync>,
}

impl IngestStage {
    pub fn new(source: Arc<dyn FixtureSource>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            source,
            store,
            crests: None,
        }
    }

    /// Enable crest sync after each raw store
    pub fn with_crests(mut self, crests: CrestSync) -> Self {
        self.crests = Some(crests);
        self
    }

    pub fn ensure_configured(&self) -> PipelineResult<()> {
        self.source.ensure_configured()
    }

    pub async fn fetch(&self, scope: ScopeKey) -> PipelineResult<Value> {
        self.source.fetch(scope).await
    }

    /// Write the response verbatim under the scope's raw key (last write wins)
    pub async fn store_raw(&self, raw: &Value, scope: ScopeKey) -> PipelineResult<ArtifactKey> {
        let key = ArtifactKey::raw(scope);
        let body = serde_json::to_vec(raw)?;

        self.store.ensure_container().await?;
        let stored = self.store.put(key.as_str(), body, CONTENT_TYPE_JSON).await?;

        info!(
            %key,
            bucket = self.store.container(),
            size = stored.size,
            checksum = %stored.checksum,
            "Stored raw response"
        );
        Ok(key)
    }

    /// Best-effort; never fails the ingest
    pub async fn sync_assets(&self, raw: &Value) -> Option<CrestSyncReport> {
        match &self.crests {
            Some(crests) => Some(crests.sync_from_response(raw).await),
            None => None,
        }
    }

    #[instrument(skip(self), fields(league = scope.league_id, season = scope.season_year))]
    pub async fn run_ingest(&self, scope: ScopeKey) -> PipelineResult<ArtifactKey> {
        let raw = self.fetch(scope).await?;
        let key = self.store_raw(&raw, scope).await?;
        self.sync_assets(&raw).await;
        Ok(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PipelineError};
    use crate::storage::memory::MemoryStore;
    use crate::storage::StoredObject;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Returns one canned response, or a 503 when there is none
    struct StaticSource(Option<Value>);

    #[async_trait]
    impl FixtureSource for StaticSource {
        fn ensure_configured(&self) -> PipelineResult<()> {
            Ok(())
        }

        async fn fetch(&self, scope: ScopeKey) -> PipelineResult<Value> {
            self.0.clone().ok_or_else(|| PipelineError::Api {
                status: 503,
                url: format!("http://api.test/fixtures?league={}", scope.league_id),
            })
        }
    }

    /// Memory store that remembers the order of writes
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        puts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        fn container(&self) -> &str {
            self.inner.container()
        }

        async fn ensure_container(&self) -> PipelineResult<()> {
            self.inner.ensure_container().await
        }

        async fn put(
            &self,
            key: &str,
            data: Vec<u8>,
            content_type: &str,
        ) -> PipelineResult<StoredObject> {
            self.puts.lock().unwrap().push(key.to_string());
            self.inner.put(key, data, content_type).await
        }

        async fn get(&self, key: &str) -> PipelineResult<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn exists(&self, key: &str) -> PipelineResult<bool> {
            self.inner.exists(key).await
        }
    }

    const SCOPE: ScopeKey = ScopeKey {
        league_id: 39,
        season_year: 2025,
    };

    fn response(logo: &str) -> Value {
        json!({
            "results": 1,
            "response": [{
                "fixture": {"id": 1001},
                "teams": {
                    "home": {"id": 1, "name": "TeamA", "logo": logo},
                    "away": {"id": 2, "name": "TeamB", "logo": ""}
                }
            }]
        })
    }

    #[tokio::test]
    async fn test_run_ingest_keeps_raw_when_crest_download_fails() {
        let store = MemoryStore::new("football");
        let shared: Arc<dyn ObjectStore> = Arc::new(store.clone());
        let raw = response("http://127.0.0.1:1/crest.png");

        let stage = IngestStage::new(Arc::new(StaticSource(Some(raw.clone()))), shared.clone())
            .with_crests(CrestSync::new(shared.clone(), Duration::from_secs(2)).unwrap());

        let key = stage.run_ingest(SCOPE).await.unwrap();

        assert_eq!(key.as_str(), "raw/league_39_season_2025.json");
        assert!(store.container_created());
        assert_eq!(store.keys(), vec![key.to_string()]);
        assert_eq!(store.content_type(key.as_str()).as_deref(), Some(CONTENT_TYPE_JSON));

        let stored = shared.get(key.as_str()).await.unwrap().unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&stored).unwrap(), raw);
    }

    #[tokio::test]
    async fn test_run_ingest_stores_raw_before_crests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crests/1.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(RecordingStore::default());
        let shared: Arc<dyn ObjectStore> = store.clone();
        let stage = IngestStage::new(
            Arc::new(StaticSource(Some(response(&format!("{}/crests/1.png", server.uri()))))),
            shared.clone(),
        )
        .with_crests(CrestSync::new(shared, Duration::from_secs(5)).unwrap());

        stage.run_ingest(SCOPE).await.unwrap();

        assert_eq!(
            *store.puts.lock().unwrap(),
            vec!["raw/league_39_season_2025.json".to_string(), "crests/team_1.png".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let store = MemoryStore::new("football");
        let stage = IngestStage::new(Arc::new(StaticSource(None)), Arc::new(store.clone()));

        let err = stage.run_ingest(SCOPE).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(store.keys().is_empty());
        assert!(!store.container_created());
    }

    #[tokio::test]
    async fn test_without_crests_sync_assets_is_a_no_op() {
        let store = MemoryStore::new("football");
        let stage = IngestStage::new(Arc::new(StaticSource(None)), Arc::new(store.clone()));

        assert!(stage.sync_assets(&response("http://x/1.png")).await.is_none());
        assert!(store.keys().is_empty());
    }
}
