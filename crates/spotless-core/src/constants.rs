//! Application-wide constants.

/// Size ceiling for files in the `additional` category (10 MiB).
pub const ADDITIONAL_MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Longest edge, in pixels, a normalized photo is scaled down to.
pub const NORMALIZE_MAX_EDGE_PX: u32 = 1920;

/// JPEG quality used when re-encoding photos.
pub const NORMALIZE_JPEG_QUALITY: u8 = 80;

/// Worker budget on constrained (mobile) devices.
pub const CONSTRAINED_CONCURRENCY: usize = 2;

/// Worker budget on everything else.
pub const STANDARD_CONCURRENCY: usize = 3;

/// Lifetime of signed read URLs handed to the gallery.
pub const SIGNED_URL_TTL_SECS: u64 = 3600;

/// Number of failure reasons quoted in a batch summary.
pub const SUMMARY_MAX_REASONS: usize = 3;
