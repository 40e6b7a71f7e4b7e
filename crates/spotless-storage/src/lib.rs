//! Spotless Storage Library
//!
//! Object storage for job photos: the Storage trait plus S3 and local
//! filesystem backends.
//!
//! # Storage key format
//!
//! Every photo of a booking lives under one folder, split by category:
//!
//! `{booking_id}_{POSTCODE}_{YYYY-MM-DD}_{customer_id}/{category}/{millis}_{ordinal}_{filename}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::ObjectPathBuilder;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use spotless_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult};
