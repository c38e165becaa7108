//! Filesystem blob backend.
//!
//! Layout under the root:
//! ```text
//! objects/<encoded key>          object bytes
//! metadata/<encoded key>.json    custom metadata (only when non-empty)
//! ```
//!
//! Keys are percent-encoded into a single file name, so `a` and `a/b` can
//! coexist and no key reaches outside its directory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::storage::{validate_key, BlobBackend, BlobObject};
use super::ServiceError;

pub struct LocalFsBlobBackend {
    root: PathBuf,
}

impl LocalFsBlobBackend {
    /// Create the backend, creating the directory layout if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let backend = Self { root: root.into() };
        fs::create_dir_all(backend.objects_dir())
            .await
            .map_err(io_error)?;
        fs::create_dir_all(backend.metadata_dir())
            .await
            .map_err(io_error)?;
        tracing::info!(root = %backend.root.display(), "Blob store ready");
        Ok(backend)
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ServiceError> {
        Ok(self.objects_dir().join(file_name(key)?))
    }

    fn metadata_path(&self, key: &str) -> Result<PathBuf, ServiceError> {
        Ok(self.metadata_dir().join(format!("{}.json", file_name(key)?)))
    }
}

/// Most file systems cap a name at 255 bytes; leave room for `.json`.
const MAX_FILE_NAME: usize = 250;

fn file_name(key: &str) -> Result<String, ServiceError> {
    validate_key(key)?;
    let encoded = urlencoding::encode(key).into_owned();
    if encoded.len() > MAX_FILE_NAME {
        return Err(ServiceError::InvalidKey(key.to_string()));
    }
    Ok(encoded)
}

fn io_error(e: std::io::Error) -> ServiceError {
    ServiceError::backend("storage", e.to_string())
}

async fn remove_if_exists(path: &Path) -> Result<(), ServiceError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(e)),
    }
}

#[async_trait]
impl BlobBackend for LocalFsBlobBackend {
    fn backend_tag(&self) -> &'static str {
        "localfs"
    }

    async fn upload(
        &self,
        key: String,
        bytes: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), ServiceError> {
        let object_path = self.object_path(&key)?;
        let metadata_path = self.metadata_path(&key)?;
        fs::write(&object_path, bytes).await.map_err(io_error)?;

        if metadata.is_empty() {
            remove_if_exists(&metadata_path).await?;
        } else {
            fs::write(&metadata_path, serde_json::to_vec(&metadata)?)
                .await
                .map_err(io_error)?;
        }
        Ok(())
    }

    async fn download(&self, key: String) -> Result<Option<BlobObject>, ServiceError> {
        let bytes = match fs::read(self.object_path(&key)?).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(e)),
        };
        let metadata = match fs::read(self.metadata_path(&key)?).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(io_error(e)),
        };
        Ok(Some(BlobObject { bytes, metadata }))
    }

    async fn delete(&self, key: String) -> Result<(), ServiceError> {
        remove_if_exists(&self.object_path(&key)?).await?;
        remove_if_exists(&self.metadata_path(&key)?).await
    }

    async fn list(&self, prefix: String) -> Result<Vec<String>, ServiceError> {
        let mut entries = fs::read_dir(self.objects_dir()).await.map_err(io_error)?;
        let mut keys = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Ok(key) = urlencoding::decode(name) else {
                tracing::warn!(file = name, "Skipping undecodable blob file name");
                continue;
            };
            if key.starts_with(&prefix) {
                keys.push(key.into_owned());
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        let meta = fs::metadata(self.objects_dir()).await.map_err(io_error)?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(ServiceError::backend("storage", "objects root is not a directory"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobBackend::open(dir.path()).await.unwrap();

        let metadata = HashMap::from([("content-type".to_string(), "text/markdown".to_string())]);
        store
            .upload("projects/p1/prd.md".into(), b"# PRD".to_vec(), metadata.clone())
            .await
            .unwrap();

        let object = store.download("projects/p1/prd.md".into()).await.unwrap().unwrap();
        assert_eq!(object.bytes, b"# PRD");
        assert_eq!(object.metadata, metadata);
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobBackend::open(dir.path()).await.unwrap();
        assert!(store.download("nope.txt".into()).await.unwrap().is_none());
        store.delete("nope.txt".into()).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobBackend::open(dir.path()).await.unwrap();
        for key in ["p1/docs/tad.md", "p1/docs/prd.md", "p1/code/main.rs", "p2/docs/prd.md"] {
            store.upload(key.into(), vec![1], HashMap::new()).await.unwrap();
        }

        let keys = store.list("p1/docs/".into()).await.unwrap();
        assert_eq!(keys, vec!["p1/docs/prd.md", "p1/docs/tad.md"]);
        assert_eq!(store.list(String::new()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobBackend::open(dir.path()).await.unwrap();
        store.upload("k".into(), vec![1, 2], HashMap::new()).await.unwrap();
        store.delete("k".into()).await.unwrap();
        assert!(store.download("k".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobBackend::open(dir.path()).await.unwrap();
        let err = store.download("../secret".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_key_and_nested_key_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobBackend::open(dir.path()).await.unwrap();
        let tagged = HashMap::from([("kind".to_string(), "doc".to_string())]);

        store.upload("a".into(), b"parent".to_vec(), tagged.clone()).await.unwrap();
        store.upload("a/b".into(), b"child".to_vec(), HashMap::new()).await.unwrap();
        store.upload("a.json/x".into(), b"odd".to_vec(), tagged.clone()).await.unwrap();

        assert_eq!(store.download("a".into()).await.unwrap().unwrap().bytes, b"parent");
        assert_eq!(store.download("a/b".into()).await.unwrap().unwrap().bytes, b"child");
        let odd = store.download("a.json/x".into()).await.unwrap().unwrap();
        assert_eq!(odd.metadata, tagged);
        assert_eq!(
            store.list("a".into()).await.unwrap(),
            vec!["a", "a.json/x", "a/b"]
        );
    }

    #[tokio::test]
    async fn test_overlong_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobBackend::open(dir.path()).await.unwrap();
        let err = store
            .upload("k".repeat(300), vec![1], HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_probe_fails_when_root_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobBackend::open(dir.path().join("blobs")).await.unwrap();
        assert!(store.probe().await.is_ok());
        std::fs::remove_dir_all(dir.path().join("blobs")).unwrap();
        assert!(store.probe().await.is_err());
    }
}
