//! End-to-end submission of a job's photos.
//!
//! One call validates the three selections, resets progress to the accepted
//! total and runs the scheduler once per non-empty category. Every key of one
//! submission shares a single timestamp.

use spotless_core::constants::SUMMARY_MAX_REASONS;
use spotless_core::models::{BatchResult, BookingContext, PhotoCategory, SelectedFile, SkippedFile};
use spotless_core::UploadConfig;
use spotless_db::PhotoMetadataStore;
use spotless_processing::{Advisory, FileSelectionValidator, SelectionOutcome};
use spotless_storage::{ObjectPathBuilder, Storage};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::BatchSummaryError;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::recorder::MetadataRecorder;
use crate::scheduler::{ConcurrentUploadScheduler, UploadBatch};

/// What the user picked for one booking.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub context: BookingContext,
    pub before: Vec<SelectedFile>,
    pub after: Vec<SelectedFile>,
    pub additional: Vec<SelectedFile>,
    /// Applied to every `additional` file.
    pub annotation: Option<String>,
    /// Overrides the configured worker count for this submission.
    pub concurrency_hint: Option<usize>,
}

impl UploadRequest {
    pub fn new(context: BookingContext) -> Self {
        Self {
            context,
            before: Vec::new(),
            after: Vec::new(),
            additional: Vec::new(),
            annotation: None,
            concurrency_hint: None,
        }
    }

    pub fn files_mut(&mut self, category: PhotoCategory) -> &mut Vec<SelectedFile> {
        match category {
            PhotoCategory::Before => &mut self.before,
            PhotoCategory::After => &mut self.after,
            PhotoCategory::Additional => &mut self.additional,
        }
    }

    fn take(&mut self, category: PhotoCategory) -> Vec<SelectedFile> {
        std::mem::take(self.files_mut(category))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Merged over all categories.
    pub result: BatchResult,
    pub per_category: BTreeMap<PhotoCategory, BatchResult>,
    /// Rejected at selection time; these never reach the scheduler.
    pub skipped: BTreeMap<PhotoCategory, Vec<SkippedFile>>,
    pub advisories: Vec<Advisory>,
    /// Categories where files were picked but none were accepted.
    pub no_compatible_files: Vec<PhotoCategory>,
}

impl PipelineReport {
    pub fn is_complete_success(&self) -> bool {
        self.result.is_complete_success()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.values().map(Vec::len).sum()
    }

    /// `Some` when at least one accepted file failed.
    pub fn summary_error(&self) -> Option<BatchSummaryError> {
        if self.result.failed_count() == 0 {
            return None;
        }
        Some(BatchSummaryError {
            failed: self.result.failed_count(),
            total: self.result.total_count,
            reasons: self.result.representative_failures(SUMMARY_MAX_REASONS),
        })
    }
}

#[derive(Clone)]
pub struct UploadPipeline {
    validator: FileSelectionValidator,
    scheduler: ConcurrentUploadScheduler,
    concurrency: usize,
}

impl UploadPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        metadata: Arc<dyn PhotoMetadataStore>,
        config: &UploadConfig,
    ) -> Self {
        let recorder = MetadataRecorder::new(metadata);
        Self {
            validator: FileSelectionValidator::from_config(config),
            scheduler: ConcurrentUploadScheduler::from_config(storage, recorder, config),
            concurrency: config.concurrency(),
        }
    }

    /// Replace the scheduler, e.g. to change retry policy in tests.
    pub fn with_scheduler(mut self, scheduler: ConcurrentUploadScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.scheduler = self.scheduler.with_cancellation(token);
        self
    }

    pub async fn upload(
        &self,
        request: UploadRequest,
        on_progress: Option<ProgressCallback>,
    ) -> PipelineReport {
        self.upload_tracked(request, &ProgressTracker::default(), on_progress)
            .await
    }

    /// Like [`upload`](Self::upload), reporting through a caller-owned tracker.
    pub async fn upload_tracked(
        &self,
        mut request: UploadRequest,
        progress: &ProgressTracker,
        on_progress: Option<ProgressCallback>,
    ) -> PipelineReport {
        let annotation = request.annotation.take();
        let concurrency = request
            .concurrency_hint
            .filter(|&n| n > 0)
            .unwrap_or(self.concurrency);

        let mut report = PipelineReport::default();
        let mut selections: Vec<(PhotoCategory, SelectionOutcome)> = Vec::new();

        for category in PhotoCategory::ALL {
            let files = request.take(category);
            let outcome = self
                .validator
                .validate(files, category, annotation.as_deref());

            if outcome.no_compatible_files {
                report.no_compatible_files.push(category);
            }
            if !outcome.skipped.is_empty() {
                report.skipped.insert(category, outcome.skipped.clone());
            }
            report.advisories.extend(outcome.advisories.iter().cloned());
            selections.push((category, outcome));
        }

        let accepted: usize = selections.iter().map(|(_, o)| o.accepted_count()).sum();
        progress.reset(accepted);

        tracing::info!(
            booking_id = %request.context.booking_id,
            accepted = accepted,
            skipped = report.skipped_count(),
            concurrency = concurrency,
            "Upload submission started"
        );

        let paths = ObjectPathBuilder::now();

        for (category, outcome) in selections {
            if outcome.accepted.is_empty() {
                continue;
            }
            let batch = UploadBatch::new(request.context.clone(), outcome.accepted, concurrency)
                .with_paths(paths);
            let result = self
                .scheduler
                .run(batch, progress, on_progress.clone())
                .await;

            report.result.merge(result.clone());
            report.per_category.insert(category, result);
        }

        if let Some(summary) = report.summary_error() {
            tracing::warn!(
                booking_id = %request.context.booking_id,
                error = %summary,
                "Upload submission finished with failures"
            );
        } else {
            tracing::info!(
                booking_id = %request.context.booking_id,
                uploaded = report.result.uploaded_count,
                "Upload submission finished"
            );
        }

        report
    }
}
