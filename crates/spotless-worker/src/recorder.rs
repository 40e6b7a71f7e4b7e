//! Metadata insert after a successful object write.
//!
//! There is no transaction spanning the object store and the metadata store.
//! If the insert fails the object stays behind as an orphan and the
//! reconciler picks it up.

use spotless_core::models::{BookingContext, NewJobPhoto, PhotoCategory};
use spotless_core::{AppError, LogLevel};
use spotless_db::PhotoMetadataStore;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct MetadataRecorder {
    store: Arc<dyn PhotoMetadataStore>,
}

impl MetadataRecorder {
    pub fn new(store: Arc<dyn PhotoMetadataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PhotoMetadataStore> {
        &self.store
    }

    /// Insert one row for `storage_key`. Never retried here.
    pub async fn record(
        &self,
        context: &BookingContext,
        storage_key: &str,
        category: PhotoCategory,
        annotation: Option<String>,
    ) -> Result<Uuid, AppError> {
        let row = NewJobPhoto::from_context(context, storage_key.to_string(), category, annotation);

        match self.store.insert(row).await {
            Ok(id) => {
                tracing::debug!(
                    photo_id = %id,
                    booking_id = %context.booking_id,
                    key = %storage_key,
                    category = %category,
                    "Photo metadata recorded"
                );
                Ok(id)
            }
            Err(e) => {
                let code = e.error_code();
                let recoverable = e.is_recoverable();
                match e.log_level() {
                    LogLevel::Debug => tracing::debug!(
                        error = %e,
                        error_code = code,
                        recoverable,
                        booking_id = %context.booking_id,
                        key = %storage_key,
                        "Photo metadata insert failed; object left as orphan"
                    ),
                    LogLevel::Warn => tracing::warn!(
                        error = %e,
                        error_code = code,
                        recoverable,
                        booking_id = %context.booking_id,
                        key = %storage_key,
                        "Photo metadata insert failed; object left as orphan"
                    ),
                    LogLevel::Error => tracing::error!(
                        error = %e,
                        error_code = code,
                        recoverable,
                        booking_id = %context.booking_id,
                        key = %storage_key,
                        "Photo metadata insert failed; object left as orphan"
                    ),
                }
                Err(e)
            }
        }
    }
}
