//! Spotless Worker Library
//!
//! Concurrent upload of job photos and the read/delete side that goes with
//! it: orphan reconciliation and the per-booking gallery.

pub mod error;
pub mod gallery;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod recorder;
pub mod scheduler;

pub use error::{BatchSummaryError, PipelineError, TaskFailure};
pub use gallery::{DeletionListener, GalleryPhoto, PhotoGallery};
pub use pipeline::{PipelineReport, UploadPipeline, UploadRequest};
pub use progress::{ProgressCallback, ProgressSnapshot, ProgressTracker};
pub use reconcile::OrphanReconciler;
pub use recorder::MetadataRecorder;
pub use scheduler::{ConcurrentUploadScheduler, UploadBatch};
