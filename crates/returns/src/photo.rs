use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rmaledger_core::{ActorId, DomainError, DomainResult, PhotoId, RmaId};

/// Per-file size ceiling (5 MiB).
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// A file submitted for attachment, not yet stored.
#[derive(Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl core::fmt::Debug for PhotoUpload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PhotoUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl PhotoUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.bytes.is_empty() {
            return Err(DomainError::validation(format!("file '{}' is empty", self.file_name)));
        }
        if self.bytes.len() > MAX_PHOTO_BYTES {
            return Err(DomainError::validation(format!(
                "file '{}' exceeds the {} MiB limit",
                self.file_name,
                MAX_PHOTO_BYTES / (1024 * 1024)
            )));
        }
        let content_type = self.content_type.trim().to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(DomainError::validation(format!(
                "file '{}' has unsupported type '{}' (allowed: {})",
                self.file_name,
                self.content_type,
                ALLOWED_CONTENT_TYPES.join(", ")
            )));
        }
        Ok(())
    }

    /// File extension for the storage key, from the content type.
    pub fn extension(&self) -> &'static str {
        match self.content_type.trim().to_ascii_lowercase().as_str() {
            "image/png" => "png",
            _ => "jpg",
        }
    }
}

/// Validate every file of a batch; nothing may be uploaded unless all pass.
pub fn validate_batch(files: &[PhotoUpload]) -> DomainResult<()> {
    if files.is_empty() {
        return Err(DomainError::validation("no files to attach"));
    }
    files.iter().try_for_each(PhotoUpload::validate)
}

/// Blob key `{rma_id}_{timestamp_millis}_{suffix}.{ext}`.
pub fn storage_key(rma_id: RmaId, now: DateTime<Utc>, suffix: &str, extension: &str) -> String {
    format!("{rma_id}_{}_{suffix}.{extension}", now.timestamp_millis())
}

/// Stored photo metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub rma_id: RmaId,
    pub storage_key: String,
    pub url: String,
    pub file_name: String,
    pub size_bytes: i64,
    pub uploaded_by: ActorId,
    pub created_at: DateTime<Utc>,
}
