//! Selection filtering for a photo batch.
//!
//! Splits what the user picked into files the scheduler will upload and
//! files refused up front, each refusal with a short reason.

use spotless_core::models::{PhotoCategory, SelectedFile, SkippedFile, UploadTask};
use spotless_core::UploadConfig;

/// Extensions accepted for before/after photos when the declared type is not `image/*`.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "heif", "dng",
];

/// Image formats that are stored as-is: the normalizer cannot decode them
/// and most browsers cannot preview them.
pub const UNCOMPRESSIBLE_EXTENSIONS: &[&str] = &["heic", "heif", "dng"];

const UNCOMPRESSIBLE_CONTENT_TYPES: &[&str] = &[
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
    "image/x-adobe-dng",
    "image/dng",
];

/// Why a file never reached the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("empty file")]
    EmptyFile,

    #[error("exceeds size limit")]
    ExceedsSizeLimit { size: usize, max: usize },

    #[error("unsupported type")]
    UnsupportedType { content_type: String },
}

/// Non-fatal note about an accepted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionOutcome {
    pub accepted: Vec<UploadTask>,
    pub skipped: Vec<SkippedFile>,
    pub advisories: Vec<Advisory>,
    /// Something was selected but nothing survived.
    pub no_compatible_files: bool,
}

impl SelectionOutcome {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

/// True for HEIC/HEIF/DNG by extension or declared type.
pub fn is_uncompressible(file: &SelectedFile) -> bool {
    let by_extension = file
        .extension()
        .map(|ext| UNCOMPRESSIBLE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    let content_type = file.content_type.to_lowercase();
    by_extension || UNCOMPRESSIBLE_CONTENT_TYPES.contains(&content_type.as_str())
}

/// True when the declared type is `image/*` or the extension is a known image suffix.
pub fn is_image(file: &SelectedFile) -> bool {
    if file.content_type.to_lowercase().starts_with("image/") {
        return true;
    }
    file.extension()
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// File selection validator
///
/// Has no I/O; everything is decided from the name, declared type and size.
#[derive(Debug, Clone, Copy)]
pub struct FileSelectionValidator {
    additional_max_file_size: usize,
}

impl FileSelectionValidator {
    pub fn new(additional_max_file_size: usize) -> Self {
        Self {
            additional_max_file_size,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.additional_max_file_size_bytes)
    }

    /// Check a single file against the rules for `category`.
    pub fn check(&self, file: &SelectedFile, category: PhotoCategory) -> Result<(), SkipReason> {
        if file.size() == 0 {
            return Err(SkipReason::EmptyFile);
        }

        match category {
            PhotoCategory::Additional => {
                if file.size() > self.additional_max_file_size {
                    return Err(SkipReason::ExceedsSizeLimit {
                        size: file.size(),
                        max: self.additional_max_file_size,
                    });
                }
            }
            PhotoCategory::Before | PhotoCategory::After => {
                if !is_image(file) {
                    return Err(SkipReason::UnsupportedType {
                        content_type: file.content_type.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Split `files` into upload tasks and skipped entries.
    ///
    /// Ordinals follow submission order among accepted files. `annotation` is
    /// attached to tasks only for the `additional` category.
    pub fn validate(
        &self,
        files: Vec<SelectedFile>,
        category: PhotoCategory,
        annotation: Option<&str>,
    ) -> SelectionOutcome {
        let selected = files.len();
        let annotation = annotation
            .map(str::trim)
            .filter(|a| !a.is_empty() && category == PhotoCategory::Additional)
            .map(String::from);

        let mut outcome = SelectionOutcome::default();

        for file in files {
            if let Err(reason) = self.check(&file, category) {
                tracing::debug!(
                    file_name = %file.name,
                    category = %category,
                    size_bytes = file.size(),
                    reason = ?reason,
                    "File skipped"
                );
                outcome.skipped.push(SkippedFile {
                    name: file.name,
                    reason: reason.to_string(),
                });
                continue;
            }

            if category.is_image_bearing() && is_uncompressible(&file) {
                outcome.advisories.push(Advisory {
                    name: file.name.clone(),
                    message: "may not compress or preview".to_string(),
                });
            }

            let ordinal = outcome.accepted.len();
            outcome.accepted.push(UploadTask {
                file,
                category,
                ordinal,
                annotation: annotation.clone(),
            });
        }

        outcome.no_compatible_files = selected > 0 && outcome.accepted.is_empty();

        tracing::debug!(
            category = %category,
            selected = selected,
            accepted = outcome.accepted.len(),
            skipped = outcome.skipped.len(),
            "File selection validated"
        );

        outcome
    }
}

impl Default for FileSelectionValidator {
    fn default() -> Self {
        Self::new(spotless_core::constants::ADDITIONAL_MAX_FILE_SIZE_BYTES)
    }
}
