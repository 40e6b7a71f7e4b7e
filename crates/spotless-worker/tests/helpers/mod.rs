#![allow(dead_code)]

use chrono::NaiveDate;
use spotless_core::models::{BookingContext, PhotoCategory, SelectedFile, UploadTask};
use spotless_core::{RetryPolicy, UploadConfig};
use spotless_db::test_helpers::InMemoryPhotoMetadataStore;
use spotless_storage::test_helpers::MockStorage;
use spotless_worker::{ConcurrentUploadScheduler, MetadataRecorder, UploadPipeline};
use std::io::Cursor;
use std::sync::Arc;
use uuid::Uuid;

pub struct TestEnv {
    pub storage: MockStorage,
    pub metadata: InMemoryPhotoMetadataStore,
    pub config: UploadConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            storage: MockStorage::new(),
            metadata: InMemoryPhotoMetadataStore::new(),
            config: UploadConfig {
                retry: RetryPolicy::none(),
                ..UploadConfig::default()
            },
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn pipeline(&self) -> UploadPipeline {
        UploadPipeline::new(
            Arc::new(self.storage.clone()),
            Arc::new(self.metadata.clone()),
            &self.config,
        )
    }

    pub fn scheduler(&self) -> ConcurrentUploadScheduler {
        ConcurrentUploadScheduler::from_config(
            Arc::new(self.storage.clone()),
            MetadataRecorder::new(Arc::new(self.metadata.clone())),
            &self.config,
        )
    }
}

pub fn booking() -> BookingContext {
    BookingContext::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Some(Uuid::new_v4()),
        "sw1a 1aa",
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
    )
}

/// A file declared as JPEG whose bytes do not decode, so normalization
/// always falls back to the raw upload.
pub fn photo(name: &str) -> SelectedFile {
    SelectedFile::new(name, "image/jpeg", format!("not really a jpeg: {}", name).into_bytes())
}

pub fn document(name: &str, size: usize) -> SelectedFile {
    SelectedFile::new(name, "application/pdf", vec![b'%'; size])
}

pub fn photos(prefix: &str, count: usize) -> Vec<SelectedFile> {
    (0..count)
        .map(|i| photo(&format!("{}_{}.jpg", prefix, i)))
        .collect()
}

/// An uncompressed BMP large enough to be downscaled and re-encoded.
pub fn large_bmp(name: &str) -> SelectedFile {
    let img = image::RgbImage::from_fn(2400, 1200, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)
        .unwrap();
    SelectedFile::new(name, "image/bmp", buf)
}

pub fn tasks(files: Vec<SelectedFile>, category: PhotoCategory) -> Vec<UploadTask> {
    files
        .into_iter()
        .enumerate()
        .map(|(ordinal, file)| UploadTask {
            file,
            category,
            ordinal,
            annotation: None,
        })
        .collect()
}
