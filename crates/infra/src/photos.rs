//! Photo attachments: validate, upload, persist, and compensate on failure.

use std::sync::Arc;

use tracing::{info, warn};

use rmaledger_core::{ActorId, Clock, PhotoId, RmaId};
use rmaledger_returns::{Photo, PhotoUpload, storage_key, validate_batch};

use crate::blob::{BlobError, BlobStore};
use crate::service::{ServiceError, ServiceResult};
use crate::store::{Store, UnitOfWork};

pub struct PhotoAttachmentManager<S: ?Sized, B: ?Sized> {
    store: Arc<S>,
    blobs: Arc<B>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized, B: ?Sized> Clone for PhotoAttachmentManager<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            blobs: self.blobs.clone(),
            clock: self.clock.clone(),
        }
    }
}

fn random_suffix() -> String {
    let mut suffix = uuid::Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    suffix
}

impl<S, B> PhotoAttachmentManager<S, B>
where
    S: Store + ?Sized,
    B: BlobStore + ?Sized,
{
    pub fn new(store: Arc<S>, blobs: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        Self { store, blobs, clock }
    }

    /// Validate the whole batch, then upload every file.
    ///
    /// Nothing is persisted here; if any upload fails, the blobs already
    /// written by this batch are deleted before the error is returned.
    pub async fn upload_batch(
        &self,
        rma_id: RmaId,
        files: &[PhotoUpload],
        actor: &ActorId,
    ) -> ServiceResult<Vec<Photo>> {
        validate_batch(files)?;

        let mut uploaded: Vec<Photo> = Vec::with_capacity(files.len());
        for file in files {
            let now = self.clock.now();
            let key = storage_key(rma_id, now, &random_suffix(), file.extension());
            match self.blobs.upload(&key, &file.bytes, &file.content_type).await {
                Ok(url) => uploaded.push(Photo {
                    id: PhotoId::new(),
                    rma_id,
                    storage_key: key,
                    url,
                    file_name: file.file_name.clone(),
                    size_bytes: file.size_bytes() as i64,
                    uploaded_by: actor.clone(),
                    created_at: now,
                }),
                Err(err) => {
                    warn!(rma_id = %rma_id, file = %file.file_name, error = %err, "photo upload failed");
                    self.discard(&uploaded).await;
                    return Err(err.into());
                }
            }
        }
        Ok(uploaded)
    }

    /// Best-effort removal of blobs that never made it into a committed row.
    pub async fn discard(&self, photos: &[Photo]) {
        for photo in photos {
            if let Err(err) = self.blobs.delete(&photo.storage_key).await {
                warn!(key = %photo.storage_key, error = %err, "orphaned photo blob could not be deleted");
            }
        }
    }

    /// Upload a batch and persist its rows in one commit (no partial batch).
    pub async fn attach(
        &self,
        rma_id: RmaId,
        files: &[PhotoUpload],
        actor: &ActorId,
    ) -> ServiceResult<Vec<Photo>> {
        let photos = self.upload_batch(rma_id, files, actor).await?;
        let work = UnitOfWork::new(self.clock.now()).with_photos(photos.clone());
        if let Err(err) = self.store.commit(work).await {
            self.discard(&photos).await;
            return Err(err.into());
        }

        info!(rma_id = %rma_id, count = photos.len(), actor = %actor, "photos attached");
        Ok(photos)
    }

    /// Delete the blob, then the row.
    pub async fn remove(&self, photo_id: PhotoId, actor: &ActorId) -> ServiceResult<Photo> {
        let photo = self
            .store
            .photo(photo_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("photo {photo_id}")))?;

        match self.blobs.delete(&photo.storage_key).await {
            Ok(()) | Err(BlobError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        self.store.delete_photo(photo_id).await?;

        info!(photo_id = %photo_id, rma_id = %photo.rma_id, actor = %actor, "photo removed");
        Ok(photo)
    }
}
