//! Orphan reconciliation.
//!
//! An orphan is an object under a booking's folder that has no metadata row,
//! typically because the insert failed after the object write succeeded.
//! Reconciliation is a read-only comparison; nothing is repaired here.

use spotless_core::models::{BookingContext, OrphanRecord, PhotoCategory};
use spotless_db::PhotoMetadataStore;
use spotless_storage::{ObjectPathBuilder, Storage};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::PipelineError;

/// Extensions treated as job evidence when scanning a folder. Anything else
/// (temp files, `.DS_Store`, partial writes) is ignored.
pub const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "heif", "dng", "pdf",
    "doc", "docx", "xls", "xlsx", "txt", "csv", "mp4", "mov",
];

fn has_recognized_extension(key: &str) -> bool {
    let leaf = key.rsplit('/').next().unwrap_or(key);
    leaf.rsplit_once('.')
        .map(|(_, ext)| RECOGNIZED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct OrphanReconciler {
    storage: Arc<dyn Storage>,
    metadata: Arc<dyn PhotoMetadataStore>,
}

impl OrphanReconciler {
    pub fn new(storage: Arc<dyn Storage>, metadata: Arc<dyn PhotoMetadataStore>) -> Self {
        Self { storage, metadata }
    }

    /// Orphans under the booking's `additional` folder.
    pub async fn reconcile(
        &self,
        context: &BookingContext,
    ) -> Result<Vec<OrphanRecord>, PipelineError> {
        self.reconcile_categories(context, &[PhotoCategory::Additional])
            .await
    }

    /// Orphans under each of `categories`, in that order, keys sorted within a category.
    pub async fn reconcile_categories(
        &self,
        context: &BookingContext,
        categories: &[PhotoCategory],
    ) -> Result<Vec<OrphanRecord>, PipelineError> {
        let known: HashSet<String> = self
            .metadata
            .select_by_booking(context.booking_id)
            .await?
            .into_iter()
            .map(|photo| photo.file_path)
            .collect();

        let mut orphans = Vec::new();

        for &category in categories {
            let prefix = ObjectPathBuilder::category_prefix(context, category);
            let mut keys = self.storage.list(&prefix).await?;
            keys.sort();

            let listed = keys.len();
            let before = orphans.len();

            orphans.extend(
                keys.into_iter()
                    .filter(|key| has_recognized_extension(key))
                    .filter(|key| !known.contains(key))
                    .map(|key| OrphanRecord {
                        booking_id: context.booking_id,
                        file_name: key.rsplit('/').next().unwrap_or(&key).to_string(),
                        file_path: key,
                        category,
                    }),
            );

            tracing::debug!(
                booking_id = %context.booking_id,
                prefix = %prefix,
                listed = listed,
                orphans = orphans.len() - before,
                "Category reconciled"
            );
        }

        if !orphans.is_empty() {
            tracing::info!(
                booking_id = %context.booking_id,
                count = orphans.len(),
                "Orphaned objects found"
            );
        }

        Ok(orphans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_extensions() {
        assert!(has_recognized_extension("a/b/1_0_report.PDF"));
        assert!(has_recognized_extension("a/b/1_0_x.jpeg"));
        assert!(!has_recognized_extension("a/b/.DS_Store"));
        assert!(!has_recognized_extension("a/b/upload.tmp"));
        assert!(!has_recognized_extension("a/b/noext"));
    }
}
