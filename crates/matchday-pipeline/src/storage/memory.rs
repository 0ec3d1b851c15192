//! In-process object store for tests and dry runs

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ObjectStore, StoredObject};
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    container_created: bool,
    objects: BTreeMap<String, MemoryObject>,
}

/// Object store backed by a shared map; clones see the same objects
#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    fn state(&self) -> PipelineResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| PipelineError::Storage("memory store lock poisoned".to_string()))
    }

    pub fn keys(&self) -> Vec<String> {
        self.state()
            .map(|s| s.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.state()
            .ok()
            .and_then(|s| s.objects.get(key).map(|o| o.content_type.clone()))
    }

    pub fn container_created(&self) -> bool {
        self.state().map(|s| s.container_created).unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn container(&self) -> &str {
        &self.name
    }

    async fn ensure_container(&self) -> PipelineResult<()> {
        self.state()?.container_created = true;
        Ok(())
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> PipelineResult<StoredObject> {
        let stored = StoredObject::describe(key, &data);
        self.state()?.objects.insert(
            key.to_string(),
            MemoryObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(stored)
    }

    async fn get(&self, key: &str) -> PipelineResult<Option<Vec<u8>>> {
        Ok(self.state()?.objects.get(key).map(|o| o.data.clone()))
    }

    async fn exists(&self, key: &str) -> PipelineResult<bool> {
        Ok(self.state()?.objects.contains_key(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_overwrites_and_clones_share_state() {
        let store = MemoryStore::new("football");
        let view = store.clone();

        store.put("raw/a.json", b"one".to_vec(), "application/json").await.unwrap();
        store.put("raw/a.json", b"two".to_vec(), "application/json").await.unwrap();

        assert_eq!(view.get("raw/a.json").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(view.keys(), vec!["raw/a.json".to_string()]);
        assert!(view.get("raw/missing.json").await.unwrap().is_none());
        assert!(!view.exists("raw/missing.json").await.unwrap());
    }
}
