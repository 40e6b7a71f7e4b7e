//! Spotless Core Library
//!
//! Domain models, error types and configuration shared by every crate of the
//! job photo upload pipeline.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{DeviceProfile, RetryPolicy, UploadConfig};
pub use error::{AppError, LogLevel};
pub use storage_types::StorageBackend;
// Note: Storage, StorageError, StorageResult live in spotless-storage
