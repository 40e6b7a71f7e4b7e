//! In-memory storage for pipeline tests.
//!
//! Besides holding objects in a map it can inject put failures and delays,
//! and it records how many puts were in flight at once.

use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct MockStorage {
    files: Arc<Mutex<BTreeMap<String, (Bytes, String)>>>,
    failing_fragments: Arc<Mutex<HashSet<String>>>,
    transient_failures: Arc<AtomicUsize>,
    put_delay: Arc<Mutex<Option<Duration>>>,
    put_calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    fail_list: Arc<Mutex<bool>>,
    fail_delete: Arc<Mutex<bool>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(BTreeMap::new())),
            failing_fragments: Arc::new(Mutex::new(HashSet::new())),
            transient_failures: Arc::new(AtomicUsize::new(0)),
            put_delay: Arc::new(Mutex::new(None)),
            put_calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            fail_list: Arc::new(Mutex::new(false)),
            fail_delete: Arc::new(Mutex::new(false)),
        }
    }

    /// Every put whose key contains `fragment` fails.
    pub fn fail_keys_containing(&self, fragment: &str) {
        self.failing_fragments
            .lock()
            .unwrap()
            .insert(fragment.to_string());
    }

    /// The next `count` puts fail regardless of key, then puts succeed again.
    pub fn fail_next_puts(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Hold each put for `delay` so concurrent workers overlap.
    pub fn set_put_delay(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_list_failure(&self, fail: bool) {
        *self.fail_list.lock().unwrap() = fail;
    }

    pub fn set_delete_failure(&self, fail: bool) {
        *self.fail_delete.lock().unwrap() = fail;
    }

    /// Seed an object directly, bypassing failure injection.
    pub fn set_file(&self, key: &str, data: impl Into<Bytes>) {
        self.files.lock().unwrap().insert(
            key.to_string(),
            (data.into(), "application/octet-stream".to_string()),
        );
    }

    pub fn has_file(&self, key: &str) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }

    pub fn get_file(&self, key: &str) -> Option<Bytes> {
        self.files.lock().unwrap().get(key).map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, content_type)| content_type.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    /// Total put attempts, failed ones included.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Highest number of puts observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_transient_failure(&self) -> bool {
        self.transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn put(&self, storage_key: &str, data: Bytes, content_type: &str) -> StorageResult<String> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let permanent = self
            .failing_fragments
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| storage_key.contains(fragment.as_str()));

        let result = if permanent {
            Err(StorageError::UploadFailed(format!(
                "simulated failure for {}",
                storage_key
            )))
        } else if self.take_transient_failure() {
            Err(StorageError::BackendError("simulated network error".to_string()))
        } else {
            self.files.lock().unwrap().insert(
                storage_key.to_string(),
                (data, content_type.to_string()),
            );
            Ok(format!("https://example.com/{}", storage_key))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        if *self.fail_list.lock().unwrap() {
            return Err(StorageError::ListFailed("simulated list failure".to_string()));
        }
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(&dir))
            .cloned()
            .collect())
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.get_file(storage_key)
            .map(|data| data.to_vec())
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        if *self.fail_delete.lock().unwrap() {
            return Err(StorageError::DeleteFailed(format!(
                "simulated delete failure for {}",
                storage_key
            )));
        }
        self.files.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "https://example.com/{}?expires={}",
            storage_key,
            expires_in.as_secs()
        ))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.has_file(storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
