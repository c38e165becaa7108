//! Blob storage capability and its per-request adapter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{probe_health, CallTimeouts, ServiceError, ServiceHealth};
use crate::log_event;
use crate::observability::RequestLogger;
use crate::resilience::run_detached;

/// A stored object with its custom metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobObject {
    pub bytes: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

/// Key-addressed blob store.
#[async_trait]
pub trait BlobBackend: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn upload(
        &self,
        key: String,
        bytes: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), ServiceError>;

    /// `Ok(None)` when the key does not exist.
    async fn download(&self, key: String) -> Result<Option<BlobObject>, ServiceError>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: String) -> Result<(), ServiceError>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: String) -> Result<Vec<String>, ServiceError>;

    /// Bounded existence/listing check; never reads object contents.
    async fn probe(&self) -> Result<(), ServiceError>;
}

/// Reject keys that are empty, absolute, or escape the store.
pub fn validate_key(key: &str) -> Result<(), ServiceError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        Err(ServiceError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// Blob storage handle bound to one request.
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn BlobBackend>,
    logger: RequestLogger,
    timeouts: CallTimeouts,
}

impl StorageService {
    pub fn new(backend: Arc<dyn BlobBackend>, logger: RequestLogger, timeouts: CallTimeouts) -> Self {
        Self {
            backend,
            logger,
            timeouts,
        }
    }

    pub async fn upload(
        &self,
        key: &str,
        bytes: impl Into<Vec<u8>>,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<(), ServiceError> {
        let bytes = bytes.into();
        log_event!(self.logger, DEBUG, key, size = bytes.len(), "Uploading object");

        let backend = Arc::clone(&self.backend);
        let owned_key = key.to_owned();
        let metadata = metadata.unwrap_or_default();
        run_detached("storage.upload", self.timeouts.call, async move {
            validate_key(&owned_key)?;
            backend.upload(owned_key, bytes, metadata).await
        })
        .await
        .inspect(|_| log_event!(self.logger, INFO, key, "Object uploaded"))
        .inspect_err(|e| log_event!(self.logger, ERROR, key, error = %e, "Failed to upload object"))
    }

    /// Object contents, or `None` if the key does not exist.
    pub async fn download(&self, key: &str) -> Result<Option<Vec<u8>>, ServiceError> {
        Ok(self
            .download_with_metadata(key)
            .await?
            .map(|object| object.bytes))
    }

    pub async fn download_with_metadata(&self, key: &str) -> Result<Option<BlobObject>, ServiceError> {
        log_event!(self.logger, DEBUG, key, "Downloading object");

        let backend = Arc::clone(&self.backend);
        let owned_key = key.to_owned();
        let object = run_detached("storage.download", self.timeouts.call, async move {
            validate_key(&owned_key)?;
            backend.download(owned_key).await
        })
        .await
        .inspect_err(|e| log_event!(self.logger, ERROR, key, error = %e, "Failed to download object"))?;

        match &object {
            Some(found) => log_event!(self.logger, DEBUG, key, size = found.bytes.len(), "Object downloaded"),
            None => log_event!(self.logger, DEBUG, key, "Object not found"),
        }
        Ok(object)
    }

    pub async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        log_event!(self.logger, DEBUG, key, "Deleting object");

        let backend = Arc::clone(&self.backend);
        let owned_key = key.to_owned();
        run_detached("storage.delete", self.timeouts.call, async move {
            validate_key(&owned_key)?;
            backend.delete(owned_key).await
        })
        .await
        .inspect(|_| log_event!(self.logger, INFO, key, "Object deleted"))
        .inspect_err(|e| log_event!(self.logger, ERROR, key, error = %e, "Failed to delete object"))
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        log_event!(self.logger, DEBUG, prefix, "Listing objects");

        let backend = Arc::clone(&self.backend);
        let owned_prefix = prefix.to_owned();
        run_detached("storage.list", self.timeouts.call, async move {
            backend.list(owned_prefix).await
        })
        .await
        .inspect(|keys| log_event!(self.logger, DEBUG, prefix, count = keys.len(), "Objects listed"))
        .inspect_err(|e| log_event!(self.logger, ERROR, prefix, error = %e, "Failed to list objects"))
    }

    pub async fn health_check(&self) -> ServiceHealth {
        let backend = Arc::clone(&self.backend);
        probe_health("storage", &self.logger, self.timeouts, async move {
            backend.probe().await
        })
        .await
    }
}
