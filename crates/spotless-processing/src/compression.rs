//! Client-side photo normalization.
//!
//! Before/after photos are downscaled and re-encoded as JPEG before upload so
//! a phone on a slow connection is not pushing 12 MP originals. The
//! normalizer never fails a task: whatever goes wrong, the caller gets a file
//! it can upload.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use spotless_core::models::{PhotoCategory, SelectedFile};
use spotless_core::{DeviceProfile, UploadConfig};
use std::io::Cursor;

use crate::validator::is_uncompressible;

/// Errors raised while re-encoding. Logged, never surfaced to the batch.
#[derive(Debug, thiserror::Error)]
pub enum NormalizationError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode JPEG: {0}")]
    Encode(#[source] image::ImageError),

    #[error("normalization task aborted: {0}")]
    Aborted(String),
}

/// What the normalizer did with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeAction {
    Recompressed { original_size: usize, new_size: usize },
    Skipped(SkipCause),
    /// Recompression failed and the original was kept.
    FellBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCause {
    NotImageCategory,
    DeviceDisabled,
    UnsupportedFormat,
    Animated,
    Transparent,
    NotSmaller,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub file: SelectedFile,
    pub action: NormalizeAction,
}

/// Downscale + JPEG re-encode for image-bearing categories.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_edge_px: u32,
    jpeg_quality: u8,
}

impl ImageNormalizer {
    pub fn new(max_edge_px: u32, jpeg_quality: u8) -> Self {
        Self {
            max_edge_px: max_edge_px.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.normalize_max_edge_px, config.normalize_jpeg_quality)
    }

    /// Normalize `file`, falling back to the original on any error.
    pub fn normalize(
        &self,
        file: SelectedFile,
        category: PhotoCategory,
        device: DeviceProfile,
    ) -> Normalized {
        if let Some(cause) = Self::skip_cause(&file, category, device) {
            return Normalized {
                file,
                action: NormalizeAction::Skipped(cause),
            };
        }

        match self.recompress(&file) {
            Ok(Recompressed::Smaller(data)) => {
                let original_size = file.size();
                let new_size = data.len();
                tracing::debug!(
                    file_name = %file.name,
                    original_size = original_size,
                    new_size = new_size,
                    "Photo recompressed"
                );
                Normalized {
                    file: SelectedFile::new(with_jpg_extension(&file.name), "image/jpeg", data),
                    action: NormalizeAction::Recompressed {
                        original_size,
                        new_size,
                    },
                }
            }
            Ok(Recompressed::Kept(cause)) => Normalized {
                file,
                action: NormalizeAction::Skipped(cause),
            },
            Err(e) => {
                tracing::warn!(
                    file_name = %file.name,
                    error = %e,
                    "Photo normalization failed, uploading original"
                );
                Normalized {
                    file,
                    action: NormalizeAction::FellBack,
                }
            }
        }
    }

    /// Same as [`normalize`](Self::normalize) but on the blocking pool.
    pub async fn normalize_async(
        &self,
        file: SelectedFile,
        category: PhotoCategory,
        device: DeviceProfile,
    ) -> Normalized {
        if let Some(cause) = Self::skip_cause(&file, category, device) {
            return Normalized {
                file,
                action: NormalizeAction::Skipped(cause),
            };
        }

        let normalizer = *self;
        let original = file.clone();
        match tokio::task::spawn_blocking(move || normalizer.normalize(file, category, device)).await
        {
            Ok(normalized) => normalized,
            Err(e) => {
                let err = NormalizationError::Aborted(e.to_string());
                tracing::warn!(
                    file_name = %original.name,
                    error = %err,
                    "Photo normalization failed, uploading original"
                );
                Normalized {
                    file: original,
                    action: NormalizeAction::FellBack,
                }
            }
        }
    }

    fn skip_cause(
        file: &SelectedFile,
        category: PhotoCategory,
        device: DeviceProfile,
    ) -> Option<SkipCause> {
        if !category.is_image_bearing() {
            return Some(SkipCause::NotImageCategory);
        }
        if !device.compression_enabled() {
            return Some(SkipCause::DeviceDisabled);
        }
        if is_uncompressible(file) {
            return Some(SkipCause::UnsupportedFormat);
        }
        let is_gif = file.content_type.eq_ignore_ascii_case("image/gif")
            || file.extension().as_deref() == Some("gif");
        if is_gif {
            return Some(SkipCause::Animated);
        }
        None
    }

    fn recompress(&self, file: &SelectedFile) -> Result<Recompressed, NormalizationError> {
        let img = image::load_from_memory(&file.data).map_err(NormalizationError::Decode)?;

        if has_meaningful_alpha(&img) {
            return Ok(Recompressed::Kept(SkipCause::Transparent));
        }

        let img = apply_exif_orientation(img, &file.data);

        let (width, height) = img.dimensions();
        let img = if width.max(height) > self.max_edge_px {
            img.resize(self.max_edge_px, self.max_edge_px, FilterType::Lanczos3)
        } else {
            img
        };

        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), self.jpeg_quality);
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(NormalizationError::Encode)?;

        if buffer.len() >= file.size() {
            return Ok(Recompressed::Kept(SkipCause::NotSmaller));
        }

        Ok(Recompressed::Smaller(Bytes::from(buffer)))
    }
}

enum Recompressed {
    Smaller(Bytes),
    Kept(SkipCause),
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(
            spotless_core::constants::NORMALIZE_MAX_EDGE_PX,
            spotless_core::constants::NORMALIZE_JPEG_QUALITY,
        )
    }
}

/// Check if image has meaningful alpha channel (not fully opaque)
fn has_meaningful_alpha(img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }
    img.to_rgba8().pixels().any(|p| p[3] < 255)
}

/// Read the EXIF orientation tag; 1 (normal) when absent or unreadable.
fn read_exif_orientation(data: &[u8]) -> u32 {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

/// Bake the EXIF orientation into the pixels. Re-encoding drops EXIF, so a
/// portrait phone photo would otherwise come out sideways.
fn apply_exif_orientation(img: DynamicImage, data: &[u8]) -> DynamicImage {
    match read_exif_orientation(data) {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate270().fliph(),
        6 => img.rotate90(),
        7 => img.rotate90().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

fn with_jpg_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
            format!("{}.{}", stem, ext)
        }
        Some((stem, _)) if !stem.is_empty() => format!("{}.jpg", stem),
        _ => format!("{}.jpg", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    fn large_bmp() -> Vec<u8> {
        let img = RgbImage::from_fn(2400, 1200, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        encode(DynamicImage::ImageRgb8(img), ImageFormat::Bmp)
    }

    #[test]
    fn test_large_photo_is_downscaled_to_jpeg() {
        let data = large_bmp();
        let original_size = data.len();
        let file = SelectedFile::new("hall.bmp", "image/bmp", data);

        let normalized =
            ImageNormalizer::default().normalize(file, PhotoCategory::Before, DeviceProfile::Standard);

        assert!(matches!(
            normalized.action,
            NormalizeAction::Recompressed { .. }
        ));
        assert_eq!(normalized.file.content_type, "image/jpeg");
        assert_eq!(normalized.file.name, "hall.jpg");
        assert!(normalized.file.size() < original_size);

        let decoded = image::load_from_memory(&normalized.file.data).unwrap();
        assert_eq!(decoded.dimensions(), (1920, 960));
    }

    #[test]
    fn test_transparent_png_untouched() {
        let img = RgbaImage::from_fn(64, 64, |x, _| Rgba([200, 10, 10, if x < 32 { 0 } else { 255 }]));
        let data = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
        let file = SelectedFile::new("logo.png", "image/png", data.clone());

        let normalized =
            ImageNormalizer::default().normalize(file, PhotoCategory::After, DeviceProfile::Standard);

        assert_eq!(
            normalized.action,
            NormalizeAction::Skipped(SkipCause::Transparent)
        );
        assert_eq!(normalized.file.data.as_ref(), data.as_slice());
        assert_eq!(normalized.file.content_type, "image/png");
    }

    #[test]
    fn test_not_smaller_keeps_original() {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let file = SelectedFile::new("dot.png", "image/png", data.clone());

        let normalized =
            ImageNormalizer::default().normalize(file, PhotoCategory::Before, DeviceProfile::Standard);

        assert_eq!(
            normalized.action,
            NormalizeAction::Skipped(SkipCause::NotSmaller)
        );
        assert_eq!(normalized.file.data.as_ref(), data.as_slice());
        assert_eq!(normalized.file.name, "dot.png");
    }

    #[test]
    fn test_corrupt_image_falls_back() {
        let file = SelectedFile::new("broken.jpg", "image/jpeg", vec![0xFF, 0xD8, 0x00, 0x01]);

        let normalized = ImageNormalizer::default().normalize(
            file.clone(),
            PhotoCategory::Before,
            DeviceProfile::Standard,
        );

        assert_eq!(normalized.action, NormalizeAction::FellBack);
        assert_eq!(normalized.file, file);
    }

    #[test]
    fn test_skips() {
        let normalizer = ImageNormalizer::default();
        let bmp = SelectedFile::new("a.bmp", "image/bmp", large_bmp());

        let additional =
            normalizer.normalize(bmp.clone(), PhotoCategory::Additional, DeviceProfile::Standard);
        assert_eq!(
            additional.action,
            NormalizeAction::Skipped(SkipCause::NotImageCategory)
        );

        let constrained =
            normalizer.normalize(bmp, PhotoCategory::Before, DeviceProfile::Constrained);
        assert_eq!(
            constrained.action,
            NormalizeAction::Skipped(SkipCause::DeviceDisabled)
        );

        let heic = SelectedFile::new("IMG_1.HEIC", "image/heic", vec![1u8; 16]);
        let heic = normalizer.normalize(heic, PhotoCategory::Before, DeviceProfile::Standard);
        assert_eq!(
            heic.action,
            NormalizeAction::Skipped(SkipCause::UnsupportedFormat)
        );

        let gif = SelectedFile::new("spin.gif", "image/gif", vec![1u8; 16]);
        let gif = normalizer.normalize(gif, PhotoCategory::After, DeviceProfile::Standard);
        assert_eq!(gif.action, NormalizeAction::Skipped(SkipCause::Animated));
    }

    #[tokio::test]
    async fn test_normalize_async() {
        let file = SelectedFile::new("hall.bmp", "image/bmp", large_bmp());
        let normalized = ImageNormalizer::default()
            .normalize_async(file, PhotoCategory::After, DeviceProfile::Standard)
            .await;
        assert_eq!(normalized.file.content_type, "image/jpeg");
    }

    #[test]
    fn test_with_jpg_extension() {
        assert_eq!(with_jpg_extension("a.png"), "a.jpg");
        assert_eq!(with_jpg_extension("a.JPEG"), "a.JPEG");
        assert_eq!(with_jpg_extension("noext"), "noext.jpg");
        assert_eq!(with_jpg_extension(".hidden"), ".hidden.jpg");
    }
}
