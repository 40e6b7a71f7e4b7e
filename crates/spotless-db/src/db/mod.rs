//! Database repositories for data access layer
//!
//! Job photo metadata lives in a single table; `pool` holds connection and
//! migration setup.

pub mod job_photo;
pub mod pool;

pub use job_photo::JobPhotoRepository;
pub use pool::{connect, run_migrations};
