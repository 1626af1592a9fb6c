//! Byte storage for photo attachments.

pub mod fs;
pub mod in_memory;

pub use fs::FsBlobStore;
pub use in_memory::InMemoryBlobStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    #[error("blob storage error: {0}")]
    Storage(String),
}

/// Object storage addressed by flat keys.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key` and return its public URL.
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError>;

    fn public_url(&self, key: &str) -> String;

    /// Remove a blob. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Keys are single path segments.
pub(crate) fn check_key(key: &str) -> Result<(), BlobError> {
    if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_cannot_escape_the_bucket() {
        assert!(check_key("abc_1_x.png").is_ok());
        for bad in ["", "../etc/passwd", "a/b.png", ".hidden", "a\\b"] {
            assert!(check_key(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn urls_join_without_double_slashes() {
        assert_eq!(join_url("/files/", "k.png"), "/files/k.png");
        assert_eq!(join_url("https://cdn.example", "k.png"), "https://cdn.example/k.png");
    }
}
