mod helpers;

use async_trait::async_trait;
use bytes::Bytes;
use helpers::{booking, photos, tasks, TestEnv};
use spotless_core::models::PhotoCategory;
use spotless_core::{RetryPolicy, StorageBackend};
use spotless_db::test_helpers::InMemoryPhotoMetadataStore;
use spotless_storage::test_helpers::MockStorage;
use spotless_storage::{Storage, StorageResult};
use spotless_worker::{ConcurrentUploadScheduler, MetadataRecorder, ProgressTracker, UploadBatch};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn batch(count: usize, limit: usize) -> UploadBatch {
    UploadBatch::new(
        booking(),
        tasks(photos("room", count), PhotoCategory::Before),
        limit,
    )
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let env = TestEnv::new();
    env.storage.set_put_delay(Duration::from_millis(20));

    let result = env
        .scheduler()
        .run(batch(10, 3), &ProgressTracker::new(10), None)
        .await;

    assert_eq!(result.uploaded_count, 10);
    assert!(env.storage.max_in_flight() <= 3);
    assert!(env.storage.max_in_flight() >= 2);
}

#[tokio::test]
async fn test_each_task_is_put_exactly_once() {
    let env = TestEnv::new();
    env.storage.set_put_delay(Duration::from_millis(2));

    let result = env
        .scheduler()
        .run(batch(25, 4), &ProgressTracker::new(25), None)
        .await;

    assert_eq!(env.storage.put_calls(), 25);
    assert_eq!(env.storage.file_count(), 25);
    assert_eq!(result.succeeded_keys.len(), 25);
    let mut keys = result.succeeded_keys.clone();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 25);
}

#[tokio::test]
async fn test_zero_limit_runs_one_worker() {
    let env = TestEnv::new();
    env.storage.set_put_delay(Duration::from_millis(5));

    let result = env
        .scheduler()
        .run(batch(4, 0), &ProgressTracker::new(4), None)
        .await;

    assert_eq!(result.uploaded_count, 4);
    assert_eq!(env.storage.max_in_flight(), 1);
}

#[tokio::test]
async fn test_empty_batch_is_complete() {
    let env = TestEnv::new();
    let result = env
        .scheduler()
        .run(batch(0, 3), &ProgressTracker::new(0), None)
        .await;

    assert_eq!(result.total_count, 0);
    assert!(result.is_complete_success());
    assert_eq!(env.storage.put_calls(), 0);
}

#[tokio::test]
async fn test_every_task_is_accounted_for() {
    let env = TestEnv::new();
    env.storage.fail_keys_containing("room_1.jpg");
    env.storage.fail_keys_containing("room_6.jpg");
    env.metadata.fail_inserts_containing("room_3.jpg");

    let result = env
        .scheduler()
        .run(batch(8, 3), &ProgressTracker::new(8), None)
        .await;

    assert_eq!(result.total_count, 8);
    assert_eq!(result.uploaded_count, 5);
    assert_eq!(result.failed_count(), 3);
    assert_eq!(result.uploaded_count + result.failed_count(), result.total_count);
    assert!(result.failures.contains_key("room_1.jpg"));
    assert!(result.failures.contains_key("room_3.jpg"));
    assert!(result.failures.contains_key("room_6.jpg"));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let env = TestEnv::new().with_retry(RetryPolicy {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 4,
    });
    env.storage.fail_next_puts(2);

    let result = env
        .scheduler()
        .run(batch(1, 1), &ProgressTracker::new(1), None)
        .await;

    assert_eq!(result.uploaded_count, 1);
    assert_eq!(env.storage.put_calls(), 3);
}

#[tokio::test]
async fn test_retries_give_up_after_limit() {
    let env = TestEnv::new().with_retry(RetryPolicy {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 2,
    });
    env.storage.fail_next_puts(10);

    let result = env
        .scheduler()
        .run(batch(1, 1), &ProgressTracker::new(1), None)
        .await;

    assert_eq!(result.uploaded_count, 0);
    assert_eq!(env.storage.put_calls(), 3);
    assert!(result.failures["room_0.jpg"].contains("simulated network error"));
}

#[tokio::test]
async fn test_cancelled_before_start_attempts_nothing() {
    let env = TestEnv::new();
    let token = CancellationToken::new();
    token.cancel();

    let result = env
        .scheduler()
        .with_cancellation(token)
        .run(batch(5, 2), &ProgressTracker::new(5), None)
        .await;

    assert_eq!(env.storage.put_calls(), 0);
    assert_eq!(result.total_count, 5);
    assert_eq!(result.failed_count(), 5);
    assert!(result.failures.values().all(|reason| reason == "cancelled"));
}

#[tokio::test]
async fn test_cancel_mid_batch_finishes_claimed_work() {
    let env = TestEnv::new();
    env.storage.set_put_delay(Duration::from_millis(50));
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = env
        .scheduler()
        .with_cancellation(token)
        .run(batch(5, 1), &ProgressTracker::new(5), None)
        .await;

    assert_eq!(result.uploaded_count, 1);
    assert_eq!(result.failed_count(), 4);
    assert!(result.failures.values().all(|reason| reason == "cancelled"));
}

/// Panics on any key containing `poison`.
struct PanickingStorage {
    inner: MockStorage,
    poison: &'static str,
}

#[async_trait]
impl Storage for PanickingStorage {
    async fn put(&self, storage_key: &str, data: Bytes, content_type: &str) -> StorageResult<String> {
        if storage_key.contains(self.poison) {
            panic!("poisoned key {}", storage_key);
        }
        self.inner.put(storage_key, data, content_type).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.inner.download(storage_key).await
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.inner.delete(storage_key).await
    }

    async fn get_presigned_url(&self, storage_key: &str, expires_in: Duration) -> StorageResult<String> {
        self.inner.get_presigned_url(storage_key, expires_in).await
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        self.inner.exists(storage_key).await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}

#[tokio::test]
async fn test_worker_panic_is_recorded_as_failure() {
    let inner = MockStorage::new();
    let storage = Arc::new(PanickingStorage {
        inner: inner.clone(),
        poison: "room_2.jpg",
    });
    let scheduler = ConcurrentUploadScheduler::from_config(
        storage,
        MetadataRecorder::new(Arc::new(InMemoryPhotoMetadataStore::new())),
        &TestEnv::new().config,
    );
    let tracker = ProgressTracker::new(6);

    let result = scheduler.run(batch(6, 2), &tracker, None).await;

    assert_eq!(result.total_count, 6);
    assert_eq!(result.uploaded_count, 5);
    assert_eq!(result.failures["room_2.jpg"], "upload worker panicked");
    assert_eq!(inner.file_count(), 5);
    assert!(tracker.snapshot().is_done());
}
