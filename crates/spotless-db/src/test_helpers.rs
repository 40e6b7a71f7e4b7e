//! In-memory metadata store for tests that should not need Postgres.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use spotless_core::models::{JobPhoto, NewJobPhoto};
use spotless_core::AppError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::metadata_traits::PhotoMetadataStore;

#[derive(Clone, Default)]
pub struct InMemoryPhotoMetadataStore {
    rows: Arc<Mutex<Vec<JobPhoto>>>,
    failing_fragments: Arc<Mutex<HashSet<String>>>,
    insert_calls: Arc<AtomicUsize>,
    fail_selects: Arc<Mutex<bool>>,
    fail_deletes: Arc<Mutex<bool>>,
}

impl InMemoryPhotoMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts whose `file_path` contains `fragment` fail.
    pub fn fail_inserts_containing(&self, fragment: &str) {
        self.failing_fragments
            .lock()
            .unwrap()
            .insert(fragment.to_string());
    }

    pub fn clear_insert_failures(&self) {
        self.failing_fragments.lock().unwrap().clear();
    }

    pub fn set_select_failure(&self, fail: bool) {
        *self.fail_selects.lock().unwrap() = fail;
    }

    pub fn set_delete_failure(&self, fail: bool) {
        *self.fail_deletes.lock().unwrap() = fail;
    }

    pub fn rows(&self) -> Vec<JobPhoto> {
        self.rows.lock().unwrap().clone()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn has_path(&self, file_path: &str) -> bool {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .any(|row| row.file_path == file_path)
    }
}

#[async_trait]
impl PhotoMetadataStore for InMemoryPhotoMetadataStore {
    async fn insert(&self, photo: NewJobPhoto) -> Result<Uuid, AppError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_fragments
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| photo.file_path.contains(fragment.as_str()));
        if failing {
            return Err(AppError::Database(sqlx::Error::Protocol(format!(
                "simulated insert failure for {}",
                photo.file_path
            ))));
        }

        let mut rows = self.rows.lock().unwrap();
        // Strictly increasing timestamps keep "newest first" stable in tests.
        let created_at = rows
            .iter()
            .map(|row| row.created_at)
            .max()
            .map(|latest| latest.max(Utc::now()) + Duration::microseconds(1))
            .unwrap_or_else(Utc::now);

        let id = Uuid::new_v4();
        rows.push(JobPhoto {
            id,
            booking_id: photo.booking_id,
            customer_id: photo.customer_id,
            cleaner_id: photo.cleaner_id,
            file_path: photo.file_path,
            category: photo.category,
            postcode: photo.postcode,
            booking_date: photo.booking_date,
            annotation: photo.annotation,
            created_at,
        });
        Ok(id)
    }

    async fn select_by_booking(&self, booking_id: Uuid) -> Result<Vec<JobPhoto>, AppError> {
        if *self.fail_selects.lock().unwrap() {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut rows: Vec<JobPhoto> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.booking_id == booking_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobPhoto>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.id == id)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        if *self.fail_deletes.lock().unwrap() {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() < before)
    }
}
