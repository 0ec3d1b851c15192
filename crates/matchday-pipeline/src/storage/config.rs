use matchday_common::env::flag_or;
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::PipelineResult;

/// Bucket shared by raw, processed and crest objects
pub const DEFAULT_BUCKET: &str = "football";

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Full endpoint URL; `None` targets AWS S3
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::for_minio("http://localhost:9000", DEFAULT_BUCKET)
    }
}

impl StorageConfig {
    /// Reads `MINIO_*` variables, falling back to `S3_*` / `AWS_*` names
    pub fn from_env() -> PipelineResult<Self> {
        let secure = flag_or("MINIO_SECURE", true)?;

        let endpoint = env::var("MINIO_ENDPOINT")
            .or_else(|_| env::var("S3_ENDPOINT"))
            .ok()
            .filter(|e| !e.trim().is_empty())
            .map(|e| normalize_endpoint(&e, secure));

        Ok(Self {
            path_style: flag_or("S3_PATH_STYLE", endpoint.is_some())?,
            endpoint,
            region: env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            bucket: env::var("MINIO_BUCKET")
                .ok()
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            access_key: env::var("MINIO_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
            secret_key: env::var("MINIO_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
        })
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: DEFAULT_REGION.to_string(),
            bucket: bucket.into(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
        }
    }
}

/// MinIO deployments are often configured as bare `host:port`
fn normalize_endpoint(raw: &str, secure: bool) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if secure {
        format!("https://{}", trimmed)
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serial_test::serial;

    #[test]
    fn test_for_minio() {
        let config = StorageConfig::for_minio("http://localhost:9000", "test-bucket");
        assert_eq!(config.endpoint, Some("http://localhost:9000".to_string()));
        assert_eq!(config.bucket, "test-bucket");
        assert!(config.path_style);
        assert_eq!(config.access_key, "minioadmin");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("minio:9000", false), "http://minio:9000");
        assert_eq!(normalize_endpoint("minio.example.com", true), "https://minio.example.com");
        assert_eq!(normalize_endpoint("http://localhost:9000/", true), "http://localhost:9000");
    }

    #[test]
    fn test_secret_is_redacted() {
        let mut config = StorageConfig::for_minio("http://localhost:9000", "football");
        config.secret_key = "hunter2".to_string();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_malformed_flag() {
        env::set_var("MINIO_ENDPOINT", "minio:9000");
        env::set_var("MINIO_SECURE", "false");
        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("http://minio:9000"));
        assert!(config.path_style);

        env::set_var("MINIO_SECURE", "sometimes");
        let err = StorageConfig::from_env().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("MINIO_SECURE"));

        env::remove_var("MINIO_SECURE");
        env::remove_var("MINIO_ENDPOINT");
    }
}
