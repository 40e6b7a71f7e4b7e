use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use super::booking::BookingContext;

/// Semantic bucket a job photo belongs to.
///
/// Decides validation rules and the storage subfolder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "photo_category", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PhotoCategory {
    Before,
    After,
    Additional,
}

impl PhotoCategory {
    pub const ALL: [PhotoCategory; 3] = [
        PhotoCategory::Before,
        PhotoCategory::After,
        PhotoCategory::Additional,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PhotoCategory::Before => "before",
            PhotoCategory::After => "after",
            PhotoCategory::Additional => "additional",
        }
    }

    /// `before` and `after` only take photos; `additional` takes any evidence file.
    pub fn is_image_bearing(self) -> bool {
        !matches!(self, PhotoCategory::Additional)
    }
}

impl Display for PhotoCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "before" => Ok(PhotoCategory::Before),
            "after" => Ok(PhotoCategory::After),
            "additional" => Ok(PhotoCategory::Additional),
            _ => Err(anyhow::anyhow!("Invalid photo category: {}", s)),
        }
    }
}

/// Metadata row describing one stored photo (table `job_photos`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct JobPhoto {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub cleaner_id: Option<Uuid>,
    /// Storage key of the object.
    pub file_path: String,
    pub category: PhotoCategory,
    pub postcode: String,
    pub booking_date: NaiveDate,
    pub annotation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobPhoto {
    /// Leaf name of the stored object.
    pub fn file_name(&self) -> &str {
        self.file_path.rsplit('/').next().unwrap_or(&self.file_path)
    }
}

/// Insert payload for a `JobPhoto`; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJobPhoto {
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub cleaner_id: Option<Uuid>,
    pub file_path: String,
    pub category: PhotoCategory,
    pub postcode: String,
    pub booking_date: NaiveDate,
    pub annotation: Option<String>,
}

impl NewJobPhoto {
    /// Build the row for `file_path`. Annotations are kept only for `additional`.
    pub fn from_context(
        context: &BookingContext,
        file_path: String,
        category: PhotoCategory,
        annotation: Option<String>,
    ) -> Self {
        let annotation = match category {
            PhotoCategory::Additional => annotation.filter(|a| !a.trim().is_empty()),
            _ => None,
        };
        Self {
            booking_id: context.booking_id,
            customer_id: context.customer_id,
            cleaner_id: context.cleaner_id,
            file_path,
            category,
            postcode: context.postcode.clone(),
            booking_date: context.booking_date,
            annotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> BookingContext {
        BookingContext::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            "sw1a 1aa",
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        )
    }

    #[test]
    fn category_round_trips_through_str() {
        for category in PhotoCategory::ALL {
            assert_eq!(category.as_str().parse::<PhotoCategory>().unwrap(), category);
        }
        assert!("during".parse::<PhotoCategory>().is_err());
    }

    #[test]
    fn only_additional_keeps_annotation() {
        let ctx = context();
        let before = NewJobPhoto::from_context(
            &ctx,
            "k".into(),
            PhotoCategory::Before,
            Some("scratch on door".into()),
        );
        assert_eq!(before.annotation, None);

        let additional = NewJobPhoto::from_context(
            &ctx,
            "k".into(),
            PhotoCategory::Additional,
            Some("scratch on door".into()),
        );
        assert_eq!(additional.annotation.as_deref(), Some("scratch on door"));

        let blank = NewJobPhoto::from_context(
            &ctx,
            "k".into(),
            PhotoCategory::Additional,
            Some("   ".into()),
        );
        assert_eq!(blank.annotation, None);
    }
}
