//! In-process blob backend for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::storage::{validate_key, BlobBackend, BlobObject};
use super::ServiceError;

#[derive(Default)]
pub struct MemoryBlobBackend {
    objects: DashMap<String, BlobObject>,
}

impl MemoryBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl BlobBackend for MemoryBlobBackend {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn upload(
        &self,
        key: String,
        bytes: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), ServiceError> {
        validate_key(&key)?;
        self.objects.insert(key, BlobObject { bytes, metadata });
        Ok(())
    }

    async fn download(&self, key: String) -> Result<Option<BlobObject>, ServiceError> {
        validate_key(&key)?;
        Ok(self.objects.get(&key).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, key: String) -> Result<(), ServiceError> {
        validate_key(&key)?;
        self.objects.remove(&key);
        Ok(())
    }

    async fn list(&self, prefix: String) -> Result<Vec<String>, ServiceError> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_operations() {
        let store = MemoryBlobBackend::new();
        assert!(store.download("a/b".into()).await.unwrap().is_none());

        store.upload("a/b".into(), b"one".to_vec(), HashMap::new()).await.unwrap();
        store.upload("a/c".into(), b"two".to_vec(), HashMap::new()).await.unwrap();
        store.upload("z".into(), b"three".to_vec(), HashMap::new()).await.unwrap();

        assert_eq!(store.list("a/".into()).await.unwrap(), vec!["a/b", "a/c"]);
        assert_eq!(store.download("a/c".into()).await.unwrap().unwrap().bytes, b"two");

        store.delete("a/b".into()).await.unwrap();
        assert_eq!(store.len(), 2);
    }
}
