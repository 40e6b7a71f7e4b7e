//! Spotless Database Layer
//!
//! Metadata persistence for job photos.

// Module declarations
pub mod db;
pub mod metadata_traits;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-exports
pub use db::{connect, run_migrations, JobPhotoRepository};
pub use metadata_traits::PhotoMetadataStore;
