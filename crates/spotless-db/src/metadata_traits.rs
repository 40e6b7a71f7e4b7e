//! Metadata store abstraction
//!
//! The upload pipeline and the gallery only need these operations, so
//! they depend on this trait rather than on Postgres directly. Tests swap in
//! the in-memory store from `test_helpers`.

use async_trait::async_trait;
use spotless_core::models::{JobPhoto, NewJobPhoto};
use spotless_core::AppError;
use uuid::Uuid;

use crate::db::job_photo::JobPhotoRepository;

#[async_trait]
pub trait PhotoMetadataStore: Send + Sync {
    /// Insert one row and return its id.
    async fn insert(&self, photo: NewJobPhoto) -> Result<Uuid, AppError>;

    /// Every row of a booking, ordered by `created_at` descending.
    async fn select_by_booking(&self, booking_id: Uuid) -> Result<Vec<JobPhoto>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<JobPhoto>, AppError>;

    /// Delete a row by id. Returns whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
impl PhotoMetadataStore for JobPhotoRepository {
    async fn insert(&self, photo: NewJobPhoto) -> Result<Uuid, AppError> {
        JobPhotoRepository::insert(self, photo).await.map(|row| row.id)
    }

    async fn select_by_booking(&self, booking_id: Uuid) -> Result<Vec<JobPhoto>, AppError> {
        self.list_by_booking(booking_id).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobPhoto>, AppError> {
        JobPhotoRepository::get(self, id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        JobPhotoRepository::delete(self, id).await
    }
}
