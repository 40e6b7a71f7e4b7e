//! Domain models for the job photo pipeline.

pub mod booking;
pub mod photo;
pub mod upload;

pub use booking::BookingContext;
pub use photo::{JobPhoto, NewJobPhoto, PhotoCategory};
pub use upload::{BatchResult, OrphanRecord, SelectedFile, SkippedFile, UploadTask};
