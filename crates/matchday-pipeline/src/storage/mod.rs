//! Staged object storage
//!
//! The pipeline treats object storage as a flat key/value store inside one
//! container (bucket). Raw API responses, processed Parquet snapshots and team
//! crests all live side by side under the prefixes in
//! [`matchday_common::types`].

use async_trait::async_trait;

use crate::error::PipelineResult;

pub mod config;
pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_PARQUET: &str = "application/vnd.apache.parquet";
pub const CONTENT_TYPE_PNG: &str = "image/png";

/// Key/value blob store holding staged pipeline artifacts
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket or container name, for logging
    fn container(&self) -> &str;

    /// Create the container if it does not exist yet
    async fn ensure_container(&self) -> PipelineResult<()>;

    /// Write `data` under `key`, replacing any existing object
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> PipelineResult<StoredObject>;

    /// Read an object; `Ok(None)` when the key does not exist
    async fn get(&self, key: &str) -> PipelineResult<Option<Vec<u8>>>;

    async fn exists(&self, key: &str) -> PipelineResult<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub checksum: String,
    pub size: i64,
}

impl StoredObject {
    pub fn describe(key: &str, data: &[u8]) -> Self {
        Self {
            key: key.to_string(),
            checksum: calculate_sha256(data),
            size: data.len() as i64,
        }
    }
}

pub(crate) fn calculate_sha256(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
