//! Spotless Processing Library
//!
//! Pre-upload work on a photo selection: deciding which files are accepted
//! for a category and shrinking the photos that are.

pub mod compression;
pub mod validator;

pub use compression::{ImageNormalizer, NormalizationError, NormalizeAction, Normalized, SkipCause};
pub use validator::{Advisory, FileSelectionValidator, SelectionOutcome, SkipReason};
