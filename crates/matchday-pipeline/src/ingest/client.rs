//! API-Football (v3) fixtures client

use async_trait::async_trait;
use matchday_common::ScopeKey;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::ApiConfig;
use crate::error::{PipelineError, PipelineResult};

const USER_AGENT: &str = concat!("matchday-pipeline/", env!("CARGO_PKG_VERSION"));

/// Where raw fixture responses come from
#[async_trait]
pub trait FixtureSource: Send + Sync {
    /// Fail with a configuration error when the source cannot be used at all.
    ///
    /// Called by [`fetch`](Self::fetch) and by the orchestrator before it takes
    /// the pipeline lock.
    fn ensure_configured(&self) -> PipelineResult<()>;

    /// Full response for one scope, with every page's `response` array merged
    async fn fetch(&self, scope: ScopeKey) -> PipelineResult<Value>;
}

pub struct ApiFootballClient {
    client: Client,
    config: ApiConfig,
}

impl ApiFootballClient {
    pub fn new(config: ApiConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, config })
    }

    fn api_key(&self) -> PipelineResult<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| PipelineError::Config("RAPIDAPI_KEY not set in environment".to_string()))
    }

    fn fixtures_url(&self) -> String {
        format!("{}/fixtures", self.config.base_url.trim_end_matches('/'))
    }

    async fn get_page(&self, scope: ScopeKey, page: Option<u32>) -> PipelineResult<Value> {
        let url = self.fixtures_url();
        let mut query = vec![
            ("league", scope.league_id.to_string()),
            ("season", scope.season_year.to_string()),
        ];
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .header("x-rapidapi-key", self.api_key()?)
            .header("x-rapidapi-host", &self.config.host)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json().await?)
    }
}

fn response_items(data: &Value) -> &[Value] {
    data.get("response")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Declared page count, when the payload carries `paging.total`
fn total_pages(data: &Value) -> Option<u32> {
    data.get("paging")?
        .get("total")?
        .as_u64()
        .map(|t| t.min(u32::MAX as u64) as u32)
}

#[async_trait]
impl FixtureSource for ApiFootballClient {
    fn ensure_configured(&self) -> PipelineResult<()> {
        self.api_key().map(|_| ())
    }

    #[instrument(skip(self), fields(league = scope.league_id, season = scope.season_year))]
    async fn fetch(&self, scope: ScopeKey) -> PipelineResult<Value> {
        self.ensure_configured()?;

        let mut data = self.get_page(scope, None).await?;
        let first_page_len = response_items(&data).len();

        let pages = match total_pages(&data) {
            Some(total) if total > 1 && first_page_len > 0 => total,
            _ => {
                info!(fixtures = first_page_len, "Fetched fixtures");
                return Ok(data);
            }
        };

        let mut all: Vec<Value> = response_items(&data).to_vec();
        for page in 2..=pages {
            let next = self.get_page(scope, Some(page)).await?;
            let items = response_items(&next);
            if items.is_empty() {
                // Declared page count overstated what the API actually has
                warn!(page, declared = pages, "Empty page before declared total; stopping");
                break;
            }
            debug!(page, fixtures = items.len(), "Fetched page");
            all.extend_from_slice(items);
        }

        info!(fixtures = all.len(), pages, "Fetched fixtures");
        if let Some(obj) = data.as_object_mut() {
            obj.insert("response".to_string(), Value::Array(all));
        }
        Ok(data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, key: Option<&str>) -> ApiFootballClient {
        ApiFootballClient::new(ApiConfig {
            base_url: server.uri(),
            api_key: key.map(String::from),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .fetch(ScopeKey::new(39, 2025))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("RAPIDAPI_KEY"));
    }

    #[tokio::test]
    async fn test_fetch_sends_headers_and_merges_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/fixtures"))
            .and(query_param("league", "39"))
            .and(query_param("season", "2025"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paging": {"current": 2, "total": 2},
                "response": [{"fixture": {"id": 2}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/fixtures"))
            .and(header("x-rapidapi-key", "test-key"))
            .and(header("x-rapidapi-host", "api-football-v1.p.rapidapi.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paging": {"current": 1, "total": 2},
                "response": [{"fixture": {"id": 1}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let data = client_for(&server, Some("test-key"))
            .fetch(ScopeKey::new(39, 2025))
            .await
            .unwrap();

        let ids: Vec<i64> = response_items(&data)
            .iter()
            .map(|f| f["fixture"]["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_overstated_page_count_stops_at_first_empty_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paging": {"current": 2, "total": 5},
                "response": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paging": {"current": 1, "total": 5},
                "response": [{"fixture": {"id": 1}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let data = client_for(&server, Some("k"))
            .fetch(ScopeKey::new(39, 2025))
            .await
            .unwrap();
        assert_eq!(response_items(&data).len(), 1);
    }

    #[tokio::test]
    async fn test_http_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("k"))
            .fetch(ScopeKey::new(39, 2025))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Api { status: 429, .. }));
        assert!(!err.is_fatal());
    }
}
