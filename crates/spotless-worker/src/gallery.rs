//! Reading back and deleting a booking's photos.

use serde::Serialize;
use spotless_core::models::{JobPhoto, OrphanRecord};
use spotless_core::UploadConfig;
use spotless_db::PhotoMetadataStore;
use spotless_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::PipelineError;

/// Notified after a photo or orphan is removed, so whatever displays it can
/// drop the entry.
pub trait DeletionListener: Send + Sync {
    fn photo_deleted(&self, photo: &JobPhoto);

    fn orphan_deleted(&self, _orphan: &OrphanRecord) {}
}

/// A metadata row plus a temporary read URL.
#[derive(Debug, Clone, Serialize)]
pub struct GalleryPhoto {
    #[serde(flatten)]
    pub photo: JobPhoto,
    /// `None` when signing failed; the row is still listed.
    pub url: Option<String>,
}

#[derive(Clone)]
pub struct PhotoGallery {
    storage: Arc<dyn Storage>,
    metadata: Arc<dyn PhotoMetadataStore>,
    url_ttl: Duration,
    listener: Option<Arc<dyn DeletionListener>>,
}

impl PhotoGallery {
    pub fn new(storage: Arc<dyn Storage>, metadata: Arc<dyn PhotoMetadataStore>) -> Self {
        Self {
            storage,
            metadata,
            url_ttl: Duration::from_secs(spotless_core::constants::SIGNED_URL_TTL_SECS),
            listener: None,
        }
    }

    pub fn from_config(
        storage: Arc<dyn Storage>,
        metadata: Arc<dyn PhotoMetadataStore>,
        config: &UploadConfig,
    ) -> Self {
        Self::new(storage, metadata).with_url_ttl(config.signed_url_ttl())
    }

    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn DeletionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Photos of a booking, newest first, each with a signed URL.
    pub async fn list(&self, booking_id: Uuid) -> Result<Vec<GalleryPhoto>, PipelineError> {
        let photos = self.metadata.select_by_booking(booking_id).await?;
        let mut listed = Vec::with_capacity(photos.len());

        for photo in photos {
            let url = match self
                .storage
                .get_presigned_url(&photo.file_path, self.url_ttl)
                .await
            {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(
                        photo_id = %photo.id,
                        key = %photo.file_path,
                        error = %e,
                        "Failed to sign photo URL"
                    );
                    None
                }
            };
            listed.push(GalleryPhoto { photo, url });
        }

        Ok(listed)
    }

    pub async fn find(
        &self,
        booking_id: Uuid,
        photo_id: Uuid,
    ) -> Result<Option<JobPhoto>, PipelineError> {
        Ok(self
            .metadata
            .get(photo_id)
            .await?
            .filter(|photo| photo.booking_id == booking_id))
    }

    /// Remove the row, then the object.
    ///
    /// If the object delete fails the row is already gone, so the object
    /// shows up as an orphan on the next reconcile.
    pub async fn delete(&self, photo: &JobPhoto) -> Result<(), PipelineError> {
        self.metadata.delete(photo.id).await?;
        self.storage.delete(&photo.file_path).await?;

        tracing::info!(
            photo_id = %photo.id,
            booking_id = %photo.booking_id,
            key = %photo.file_path,
            "Photo deleted"
        );

        if let Some(listener) = &self.listener {
            listener.photo_deleted(photo);
        }
        Ok(())
    }

    /// Remove an orphaned object. There is no row to delete.
    pub async fn delete_orphan(&self, orphan: &OrphanRecord) -> Result<(), PipelineError> {
        self.storage.delete(&orphan.file_path).await?;

        tracing::info!(
            booking_id = %orphan.booking_id,
            key = %orphan.file_path,
            "Orphaned object deleted"
        );

        if let Some(listener) = &self.listener {
            listener.orphan_deleted(orphan);
        }
        Ok(())
    }
}
