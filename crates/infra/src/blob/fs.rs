use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::instrument;

use super::{BlobError, BlobStore, check_key, join_url};

/// Blob store writing one file per key under a root directory.
///
/// URLs are `{public_base_url}/{key}`; serving the directory is left to the
/// HTTP layer or a reverse proxy.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    /// Create the store, creating `root` if needed.
    pub async fn open(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Result<Self, BlobError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| BlobError::Storage(format!("cannot create {}: {e}", root.display())))?;
        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()), err)]
    async fn upload(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String, BlobError> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::Storage(format!("write {}: {e}", path.display())))?;
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Storage(format!("remove {}: {e}", path.display()))),
        }
    }
}
