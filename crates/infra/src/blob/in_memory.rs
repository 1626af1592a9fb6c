use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{BlobError, BlobStore, check_key, join_url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory blob store for tests/dev.
///
/// `fail_uploads_after(n)` lets the next `n` uploads succeed and fails the rest.
#[derive(Debug)]
pub struct InMemoryBlobStore {
    base_url: String,
    blobs: RwLock<HashMap<String, StoredBlob>>,
    uploads_left: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            blobs: RwLock::new(HashMap::new()),
            uploads_left: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn fail_uploads_after(&self, successful: usize) {
        self.uploads_left.store(successful, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.blobs.read().ok()?.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("/files")
    }
}

#[async_trait::async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError> {
        check_key(key)?;
        let allowed = self
            .uploads_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(BlobError::Storage(format!("injected upload failure for '{key}'")));
        }

        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| BlobError::Storage("lock poisoned".to_string()))?;
        blobs.insert(
            key.to_string(),
            StoredBlob {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        check_key(key)?;
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| BlobError::Storage("lock poisoned".to_string()))?;
        blobs.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_delete() {
        let store = InMemoryBlobStore::default();
        let url = store.upload("a.png", b"png", "image/png").await.unwrap();
        assert_eq!(url, "/files/a.png");
        assert_eq!(store.get("a.png").unwrap().content_type, "image/png");

        store.delete("a.png").await.unwrap();
        assert!(store.is_empty());
        store.delete("a.png").await.unwrap();
    }

    #[tokio::test]
    async fn injected_failure_kicks_in_after_quota() {
        let store = InMemoryBlobStore::default();
        store.fail_uploads_after(1);
        assert!(store.upload("a.jpg", b"1", "image/jpeg").await.is_ok());
        assert!(matches!(
            store.upload("b.jpg", b"2", "image/jpeg").await,
            Err(BlobError::Storage(_))
        ));
        assert_eq!(store.len(), 1);
    }
}
