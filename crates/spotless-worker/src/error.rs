//! Error types for the upload pipeline.
//!
//! Per-file problems never abort a batch; they become a [`TaskFailure`]
//! whose message lands in the batch's failure map.

use spotless_core::AppError;
use spotless_storage::StorageError;
use thiserror::Error;

/// Why one upload task did not produce a recorded photo.
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("upload failed: {0}")]
    Upload(#[source] StorageError),

    #[error("metadata insert failed [{code}]: {0}", code = .0.error_code())]
    MetadataInsert(#[source] AppError),

    #[error("cancelled")]
    Cancelled,

    #[error("upload worker panicked")]
    WorkerPanicked,

    #[error("not attempted")]
    NotAttempted,
}

/// Batch-level summary raised when any task failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{failed} of {total} files failed to upload: {}", reasons.join("; "))]
pub struct BatchSummaryError {
    pub failed: usize,
    pub total: usize,
    /// A few `"name: reason"` entries, not the full list.
    pub reasons: Vec<String>,
}

/// Errors from the read/delete side (reconciliation, gallery).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata store error: {0}")]
    Metadata(#[from] AppError),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Storage(e) => e.into(),
            PipelineError::Metadata(e) => e,
        }
    }
}
