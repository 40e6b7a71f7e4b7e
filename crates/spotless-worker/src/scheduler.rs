//! Bounded concurrent upload of one batch.
//!
//! A fixed number of workers share one atomic cursor over the task list.
//! Each worker claims the next index with `fetch_add`, so an index is claimed
//! at most once, and runs normalize → key → put → metadata insert for it.
//! Per-file failures are collected, never propagated: the batch always runs
//! to completion and returns a full partition of its tasks.
//!
//! Ordering: workers finish in any order. The ordinal embedded in each key
//! recovers submission order.

use bytes::Bytes;
use rand::Rng;
use spotless_core::models::{BatchResult, BookingContext, UploadTask};
use spotless_core::{DeviceProfile, RetryPolicy, UploadConfig};
use spotless_processing::ImageNormalizer;
use spotless_storage::{ObjectPathBuilder, Storage, StorageError};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::TaskFailure;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::recorder::MetadataRecorder;

const PENDING: u8 = 0;
const CLAIMED: u8 = 1;
const DONE: u8 = 2;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One scheduler invocation: the tasks of a single category plus the
/// booking they belong to.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub context: BookingContext,
    pub tasks: Vec<UploadTask>,
    pub concurrency_limit: usize,
    /// Carries the submission timestamp shared by every key of the batch.
    pub paths: ObjectPathBuilder,
}

impl UploadBatch {
    pub fn new(context: BookingContext, tasks: Vec<UploadTask>, concurrency_limit: usize) -> Self {
        Self {
            context,
            tasks,
            concurrency_limit,
            paths: ObjectPathBuilder::now(),
        }
    }

    pub fn with_paths(mut self, paths: ObjectPathBuilder) -> Self {
        self.paths = paths;
        self
    }
}

/// State shared by the workers of one run.
struct RunState {
    context: BookingContext,
    paths: ObjectPathBuilder,
    tasks: Vec<UploadTask>,
    cursor: AtomicUsize,
    task_states: Vec<AtomicU8>,
    result: Mutex<BatchResult>,
    progress: ProgressTracker,
    on_progress: Option<ProgressCallback>,
}

impl RunState {
    /// Claim the next unprocessed index, or `None` once the list is exhausted.
    fn claim(&self) -> Option<usize> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        if index >= self.tasks.len() {
            return None;
        }
        self.task_states[index].store(CLAIMED, Ordering::SeqCst);
        Some(index)
    }

    async fn finish(&self, index: usize, outcome: Result<String, TaskFailure>) {
        let task = &self.tasks[index];
        {
            let mut result = self.result.lock().await;
            match outcome {
                Ok(key) => result.record_success(key),
                Err(failure) => {
                    result.record_failure(&task.file.name, task.ordinal, failure.to_string())
                }
            }
        }
        self.task_states[index].store(DONE, Ordering::SeqCst);

        let snapshot = self.progress.increment();
        if let Some(callback) = &self.on_progress {
            callback(snapshot);
        }
    }
}

/// Runs upload batches over a bounded pool of tokio tasks.
#[derive(Clone)]
pub struct ConcurrentUploadScheduler {
    storage: Arc<dyn Storage>,
    recorder: MetadataRecorder,
    normalizer: ImageNormalizer,
    device: DeviceProfile,
    retry: RetryPolicy,
    cancel: Option<CancellationToken>,
}

impl ConcurrentUploadScheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        recorder: MetadataRecorder,
        normalizer: ImageNormalizer,
        device: DeviceProfile,
    ) -> Self {
        Self {
            storage,
            recorder,
            normalizer,
            device,
            retry: RetryPolicy::default(),
            cancel: None,
        }
    }

    pub fn from_config(
        storage: Arc<dyn Storage>,
        recorder: MetadataRecorder,
        config: &UploadConfig,
    ) -> Self {
        Self::new(
            storage,
            recorder,
            ImageNormalizer::from_config(config),
            config.device_profile,
        )
        .with_retry(config.retry)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Once `token` is cancelled workers stop claiming; unclaimed tasks are
    /// reported as failed with reason "cancelled".
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Upload every task of `batch` and return the partition of outcomes.
    ///
    /// `progress` is incremented once per task outcome; it is not reset here
    /// so several batches can share one tracker.
    pub async fn run(
        &self,
        batch: UploadBatch,
        progress: &ProgressTracker,
        on_progress: Option<ProgressCallback>,
    ) -> BatchResult {
        let total = batch.tasks.len();
        if total == 0 {
            return BatchResult::new(0);
        }

        let worker_count = batch.concurrency_limit.max(1).min(total);
        let start = std::time::Instant::now();

        tracing::info!(
            booking_id = %batch.context.booking_id,
            total = total,
            workers = worker_count,
            "Upload batch started"
        );

        let state = Arc::new(RunState {
            context: batch.context,
            paths: batch.paths,
            task_states: (0..total).map(|_| AtomicU8::new(PENDING)).collect(),
            tasks: batch.tasks,
            cursor: AtomicUsize::new(0),
            result: Mutex::new(BatchResult::new(total)),
            progress: progress.clone(),
            on_progress,
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let scheduler = self.clone();
            let state = Arc::clone(&state);
            workers.spawn(async move { scheduler.worker_loop(worker_id, state).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Upload worker terminated abnormally");
            }
        }

        // Anything not DONE belongs to a worker that died mid-task or was
        // never claimed because the batch was cancelled.
        for (index, task_state) in state.task_states.iter().enumerate() {
            let failure = match task_state.load(Ordering::SeqCst) {
                DONE => continue,
                CLAIMED => TaskFailure::WorkerPanicked,
                _ if self.is_cancelled() => TaskFailure::Cancelled,
                _ => TaskFailure::NotAttempted,
            };
            state.finish(index, Err(failure)).await;
        }

        let result = state.result.lock().await.clone();

        tracing::info!(
            total = result.total_count,
            uploaded = result.uploaded_count,
            failed = result.failed_count(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload batch finished"
        );

        result
    }

    async fn worker_loop(&self, worker_id: usize, state: Arc<RunState>) {
        loop {
            if self.is_cancelled() {
                tracing::debug!(worker_id = worker_id, "Upload worker stopping: cancelled");
                break;
            }

            let Some(index) = state.claim() else {
                break;
            };

            let task = &state.tasks[index];
            let outcome = self.process(&state.context, &state.paths, task).await;
            if let Err(ref failure) = outcome {
                tracing::warn!(
                    worker_id = worker_id,
                    file_name = %task.file.name,
                    ordinal = task.ordinal,
                    error = %failure,
                    "Upload task failed"
                );
            }
            state.finish(index, outcome).await;
        }
    }

    /// normalize → key → put → metadata insert for one task.
    async fn process(
        &self,
        context: &BookingContext,
        paths: &ObjectPathBuilder,
        task: &UploadTask,
    ) -> Result<String, TaskFailure> {
        let normalized = self
            .normalizer
            .normalize_async(task.file.clone(), task.category, self.device)
            .await;

        let keyed = UploadTask {
            file: normalized.file,
            category: task.category,
            ordinal: task.ordinal,
            annotation: task.annotation.clone(),
        };
        let key = paths.build_key(context, &keyed);

        let content_type = if keyed.file.content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            keyed.file.content_type.as_str()
        };

        self.put_with_retry(&key, keyed.file.data.clone(), content_type)
            .await
            .map_err(TaskFailure::Upload)?;

        self.recorder
            .record(context, &key, task.category, task.annotation.clone())
            .await
            .map_err(TaskFailure::MetadataInsert)?;

        Ok(key)
    }

    /// Object writes are idempotent by key, so retrying a put is safe.
    async fn put_with_retry(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut attempt: u32 = 0;
        loop {
            match self.storage.put(key, data.clone(), content_type).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = jittered(self.retry.backoff(attempt));
                    tracing::warn!(
                        key = %key,
                        attempt = attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Upload failed, retrying"
                    );

                    match &self.cancel {
                        Some(token) => {
                            tokio::select! {
                                _ = token.cancelled() => return Err(e),
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        None => tokio::time::sleep(delay).await,
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// Uniform jitter over the upper half of the delay.
fn jittered(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return delay;
    }
    let half = ms / 2;
    Duration::from_millis(half + rand::rng().random_range(0..=ms - half))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let d = jittered(Duration::from_millis(400));
            assert!(d >= Duration::from_millis(200));
            assert!(d <= Duration::from_millis(400));
        }
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay_ms: 250,
            max_delay_ms: 1000,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
    }
}
