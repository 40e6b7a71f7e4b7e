//! Configuration module
//!
//! Pipeline settings read from the environment (a `.env` file is honoured).
//! Device capability is an explicit setting here rather than something the
//! pipeline sniffs at runtime.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    ADDITIONAL_MAX_FILE_SIZE_BYTES, CONSTRAINED_CONCURRENCY, NORMALIZE_JPEG_QUALITY,
    NORMALIZE_MAX_EDGE_PX, SIGNED_URL_TTL_SECS, STANDARD_CONCURRENCY,
};
use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const UPLOAD_MAX_RETRIES: u32 = 2;
const UPLOAD_RETRY_BASE_DELAY_MS: u64 = 250;
const UPLOAD_RETRY_MAX_DELAY_MS: u64 = 5_000;

/// Class of device driving the upload.
///
/// Constrained devices (phones on the job) get a smaller worker budget and
/// skip client-side recompression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    Constrained,
    #[default]
    Standard,
}

impl DeviceProfile {
    pub fn default_concurrency(self) -> usize {
        match self {
            DeviceProfile::Constrained => CONSTRAINED_CONCURRENCY,
            DeviceProfile::Standard => STANDARD_CONCURRENCY,
        }
    }

    pub fn compression_enabled(self) -> bool {
        matches!(self, DeviceProfile::Standard)
    }
}

impl FromStr for DeviceProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "constrained" | "mobile" => Ok(DeviceProfile::Constrained),
            "standard" | "desktop" => Ok(DeviceProfile::Standard),
            _ => Err(anyhow::anyhow!("Invalid device profile: {}", s)),
        }
    }
}

impl Display for DeviceProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DeviceProfile::Constrained => write!(f, "constrained"),
            DeviceProfile::Standard => write!(f, "standard"),
        }
    }
}

/// Bounded retry for object-store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one. 0 disables retrying.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Exponential delay before retry number `attempt` (1-based), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: UPLOAD_MAX_RETRIES,
            base_delay_ms: UPLOAD_RETRY_BASE_DELAY_MS,
            max_delay_ms: UPLOAD_RETRY_MAX_DELAY_MS,
        }
    }
}

/// Upload pipeline configuration
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub environment: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, Supabase, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Pipeline behaviour
    pub device_profile: DeviceProfile,
    pub concurrency_override: Option<usize>,
    pub additional_max_file_size_bytes: usize,
    pub normalize_max_edge_px: u32,
    pub normalize_jpeg_quality: u8,
    pub retry: RetryPolicy,
    pub signed_url_ttl_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: None,
            local_storage_base_url: None,
            device_profile: DeviceProfile::default(),
            concurrency_override: None,
            additional_max_file_size_bytes: ADDITIONAL_MAX_FILE_SIZE_BYTES,
            normalize_max_edge_px: NORMALIZE_MAX_EDGE_PX,
            normalize_jpeg_quality: NORMALIZE_JPEG_QUALITY,
            retry: RetryPolicy::default(),
            signed_url_ttl_secs: SIGNED_URL_TTL_SECS,
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StorageBackend::S3,
        };

        let device_profile = match var("DEVICE_PROFILE") {
            Some(raw) => raw.parse()?,
            None => defaults.device_profile,
        };

        let concurrency_override = match var("UPLOAD_CONCURRENCY") {
            Some(raw) => Some(
                raw.parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("UPLOAD_CONCURRENCY must be a positive number"))?,
            ),
            None => None,
        };

        let additional_max_file_size_bytes = var("ADDITIONAL_MAX_FILE_SIZE_MB")
            .and_then(|s| s.parse::<usize>().ok())
            .map(|mb| mb * 1024 * 1024)
            .unwrap_or(defaults.additional_max_file_size_bytes);

        let retry = RetryPolicy {
            max_retries: var("UPLOAD_MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(UPLOAD_MAX_RETRIES),
            base_delay_ms: var("UPLOAD_RETRY_BASE_DELAY_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(UPLOAD_RETRY_BASE_DELAY_MS),
            max_delay_ms: var("UPLOAD_RETRY_MAX_DELAY_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(UPLOAD_RETRY_MAX_DELAY_MS),
        };

        let config = UploadConfig {
            environment: var("ENVIRONMENT")
                .or_else(|| var("APP_ENV"))
                .unwrap_or(defaults.environment),
            database_url: var("DATABASE_URL"),
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION"),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_region: var("AWS_REGION"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
            device_profile,
            concurrency_override,
            additional_max_file_size_bytes,
            normalize_max_edge_px: var("NORMALIZE_MAX_EDGE_PX")
                .and_then(|s| s.parse().ok())
                .unwrap_or(NORMALIZE_MAX_EDGE_PX),
            normalize_jpeg_quality: var("NORMALIZE_JPEG_QUALITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(NORMALIZE_JPEG_QUALITY),
            retry,
            signed_url_ttl_secs: var("SIGNED_URL_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(SIGNED_URL_TTL_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.concurrency_override == Some(0) {
            return Err(anyhow::anyhow!("UPLOAD_CONCURRENCY must be at least 1"));
        }

        if self.normalize_jpeg_quality == 0 || self.normalize_jpeg_quality > 100 {
            return Err(anyhow::anyhow!(
                "NORMALIZE_JPEG_QUALITY must be between 1 and 100"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    /// Worker budget: explicit override, else the device default. Never 0.
    pub fn concurrency(&self) -> usize {
        self.concurrency_override
            .unwrap_or_else(|| self.device_profile.default_concurrency())
            .max(1)
    }

    pub fn compression_enabled(&self) -> bool {
        self.device_profile.compression_enabled()
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn local_backend_requires_path_and_url() {
        let err = UploadConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "local")])).unwrap_err();
        assert!(err.to_string().contains("LOCAL_STORAGE_PATH"));

        let config = UploadConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/spotless"),
            ("LOCAL_STORAGE_BASE_URL", "http://localhost:3000/media"),
        ]))
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Local);
    }

    #[test]
    fn s3_is_the_default_backend() {
        let err = UploadConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));

        let config = UploadConfig::from_lookup(lookup(&[
            ("S3_BUCKET", "job-photos"),
            ("AWS_REGION", "eu-west-2"),
        ]))
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::S3);
    }

    #[test]
    fn device_profile_drives_concurrency_and_compression() {
        let base = [
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/spotless"),
            ("LOCAL_STORAGE_BASE_URL", "http://localhost"),
        ];

        let mut pairs = base.to_vec();
        pairs.push(("DEVICE_PROFILE", "mobile"));
        let constrained = UploadConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(constrained.concurrency(), 2);
        assert!(!constrained.compression_enabled());

        let standard = UploadConfig::from_lookup(lookup(&base)).unwrap();
        assert_eq!(standard.concurrency(), 3);
        assert!(standard.compression_enabled());

        let mut pairs = base.to_vec();
        pairs.push(("UPLOAD_CONCURRENCY", "5"));
        let overridden = UploadConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(overridden.concurrency(), 5);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = UploadConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/spotless"),
            ("LOCAL_STORAGE_BASE_URL", "http://localhost"),
            ("UPLOAD_CONCURRENCY", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("UPLOAD_CONCURRENCY"));
    }

    #[test]
    fn additional_limit_is_read_in_megabytes() {
        let config = UploadConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/spotless"),
            ("LOCAL_STORAGE_BASE_URL", "http://localhost"),
            ("ADDITIONAL_MAX_FILE_SIZE_MB", "25"),
        ]))
        .unwrap();
        assert_eq!(config.additional_max_file_size_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn retry_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 350,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(RetryPolicy::none().backoff(4), Duration::ZERO);
    }

    #[test]
    fn bad_database_url_is_rejected() {
        let err = UploadConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/spotless"),
            ("LOCAL_STORAGE_BASE_URL", "http://localhost"),
            ("DATABASE_URL", "mysql://nope"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
