//! Downstream dashboard cache invalidation

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Cache in front of the dashboard read path.
///
/// The orchestrator clears it after every run and only logs failures.
#[async_trait]
pub trait PresentationCache: Send + Sync {
    async fn clear(&self) -> PipelineResult<()>;
}

/// Used when no dashboard cache is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl PresentationCache for NoopCache {
    async fn clear(&self) -> PipelineResult<()> {
        debug!("No presentation cache configured");
        Ok(())
    }
}

/// POSTs to a dashboard endpoint that drops its cache
pub struct WebhookCache {
    client: Client,
    url: String,
}

impl WebhookCache {
    pub fn new(url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PresentationCache for WebhookCache {
    async fn clear(&self) -> PipelineResult<()> {
        let response = self.client.post(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        info!(url = %self.url, "Dashboard cache cleared");
        Ok(())
    }
}
