//! Storage key construction for job photos.
//!
//! Layout: `{booking_id}_{POSTCODE}_{booking_date}_{customer_id}/{category}/{millis}_{ordinal}_{filename}`.
//!
//! Keys are a pure function of the booking, the task and the batch submission
//! time, so uploading the same batch again overwrites instead of adding.

use chrono::{DateTime, Utc};
use spotless_core::models::{BookingContext, PhotoCategory, UploadTask};

const MAX_FILENAME_LEN: usize = 120;

/// Builds storage keys for one batch.
///
/// The submission timestamp is captured once and reused for every task so a
/// batch's objects sit together and sort in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectPathBuilder {
    submitted_at: DateTime<Utc>,
}

impl ObjectPathBuilder {
    pub fn new(submitted_at: DateTime<Utc>) -> Self {
        Self { submitted_at }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Folder shared by every photo of a booking.
    pub fn base_folder(context: &BookingContext) -> String {
        format!(
            "{}_{}_{}_{}",
            context.booking_id,
            sanitize_postcode(&context.postcode),
            context.booking_date.format("%Y-%m-%d"),
            context.customer_id
        )
    }

    /// `{base}/{category}`, the prefix listed by reconciliation.
    pub fn category_prefix(context: &BookingContext, category: PhotoCategory) -> String {
        format!("{}/{}", Self::base_folder(context), category.as_str())
    }

    pub fn build_key(&self, context: &BookingContext, task: &UploadTask) -> String {
        format!(
            "{}/{}_{}_{}",
            Self::category_prefix(context, task.category),
            self.submitted_at.timestamp_millis(),
            task.ordinal,
            sanitize_filename(&task.file.name)
        )
    }
}

/// Strip all whitespace and upper-case, e.g. `"sw1a 1aa"` → `"SW1A1AA"`.
pub fn sanitize_postcode(postcode: &str) -> String {
    postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Reduce a user filename to `[A-Za-z0-9._-]`, dropping any directory part.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let mut s: String = base
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while s.contains("..") {
        s = s.replace("..", ".");
    }
    let s = s.trim_start_matches('.').to_string();

    if s.trim_matches('_').is_empty() {
        "file".to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use spotless_core::models::SelectedFile;
    use uuid::Uuid;

    fn context() -> BookingContext {
        BookingContext::new(
            Uuid::parse_str("6f1c1f4e-8a55-4c1b-9d0e-2b7a3c4d5e6f").unwrap(),
            Uuid::parse_str("0a0b0c0d-1111-2222-3333-444455556666").unwrap(),
            None,
            " sw1a 1aa ",
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        )
    }

    fn task(name: &str, category: PhotoCategory, ordinal: usize) -> UploadTask {
        UploadTask {
            file: SelectedFile::new(name, "image/jpeg", vec![1u8, 2, 3]),
            category,
            ordinal,
            annotation: None,
        }
    }

    #[test]
    fn test_key_layout() {
        let submitted = Utc.timestamp_millis_opt(1_710_000_000_123).unwrap();
        let builder = ObjectPathBuilder::new(submitted);
        let key = builder.build_key(&context(), &task("kitchen.jpg", PhotoCategory::Before, 4));
        assert_eq!(
            key,
            "6f1c1f4e-8a55-4c1b-9d0e-2b7a3c4d5e6f_SW1A1AA_2024-03-09_0a0b0c0d-1111-2222-3333-444455556666/before/1710000000123_4_kitchen.jpg"
        );
    }

    #[test]
    fn test_key_is_deterministic() {
        let builder = ObjectPathBuilder::now();
        let t = task("bath room.png", PhotoCategory::After, 1);
        let first = builder.build_key(&context(), &t);
        for _ in 0..10 {
            assert_eq!(builder.build_key(&context(), &t), first);
        }
    }

    #[test]
    fn test_ordinal_separates_same_name() {
        let builder = ObjectPathBuilder::now();
        let a = builder.build_key(&context(), &task("IMG.jpg", PhotoCategory::Before, 0));
        let b = builder.build_key(&context(), &task("IMG.jpg", PhotoCategory::Before, 1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_category_prefix_is_key_prefix() {
        let builder = ObjectPathBuilder::now();
        let key = builder.build_key(&context(), &task("a.pdf", PhotoCategory::Additional, 0));
        let prefix = ObjectPathBuilder::category_prefix(&context(), PhotoCategory::Additional);
        assert!(key.starts_with(&format!("{}/", prefix)));
    }

    #[test]
    fn test_sanitize_postcode() {
        assert_eq!(sanitize_postcode("ec1a 1bb"), "EC1A1BB");
        assert_eq!(sanitize_postcode("\tM1  1AE\n"), "M11AE");
        assert_eq!(sanitize_postcode("ab/12"), "AB_12");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Front Door (1).JPG"), "Front_Door__1_.JPG");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\pic.png"), "pic.png");
        assert_eq!(sanitize_filename("my..photo.jpg"), "my.photo.jpg");
        assert_eq!(sanitize_filename("ñ"), "file");
        assert!(!sanitize_filename("...hidden").starts_with('.'));
    }
}
