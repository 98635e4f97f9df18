//! Object storage for course materials
//!
//! Uploaded files and videos are stored under keys such as
//! `course_files/{uuid}.pdf`. The key is what gets persisted in the
//! `uploads.file_path` / `upload_videos.video_path` columns, so several rows
//! may point at the same object after a course is duplicated.
//!
//! Two backends are available:
//! - [`LocalStorage`]: a directory on disk (default)
//! - [`S3Storage`]: an S3-compatible bucket accessed with SigV4-signed requests

pub mod local;
pub mod s3;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StorageConfig, StorageDriver};

pub use local::LocalStorage;
pub use s3::S3Storage;

/// Backend-agnostic object store
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `data` under `key`, replacing any existing object
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Whether an object exists under `key`
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove the object under `key`
    async fn delete(&self, key: &str) -> Result<()>;

    /// Backend name for logging
    fn driver_name(&self) -> &'static str;
}

pub type DynObjectStorage = Arc<dyn ObjectStorage>;

/// Create the storage backend selected by configuration
pub fn create_storage(config: &StorageConfig) -> Result<DynObjectStorage> {
    match config.driver {
        StorageDriver::Local => {
            tracing::info!("Using local storage at {}", config.path.display());
            Ok(Arc::new(LocalStorage::new(&config.path)))
        }
        StorageDriver::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .context("storage.s3 must be set when storage.driver is s3")?;
            tracing::info!("Using S3 storage, bucket {}", s3.bucket);
            Ok(Arc::new(S3Storage::new(s3.clone())?))
        }
    }
}

/// Reject keys that could escape the storage root
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        bail!("Empty storage key");
    }
    if key.starts_with('/') || key.contains('\\') {
        bail!("Invalid storage key: {}", key);
    }
    if key.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        bail!("Invalid storage key: {}", key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::S3Config;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("course_files/a.pdf").is_ok());
        assert!(validate_key("course_videos/x/y.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("course_files/../secret").is_err());
        assert!(validate_key("course_files//a.pdf").is_err());
        assert!(validate_key("a\\b").is_err());
    }

    #[test]
    fn test_create_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            path: dir.path().to_path_buf(),
            ..Default::default()
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.driver_name(), "local");
    }

    #[test]
    fn test_create_s3_storage_requires_settings() {
        let mut config = StorageConfig {
            driver: StorageDriver::S3,
            ..Default::default()
        };
        assert!(create_storage(&config).is_err());

        config.s3 = Some(S3Config {
            bucket: "materials".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            access_key: "minio".to_string(),
            secret_key: "minio-secret".to_string(),
        });
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.driver_name(), "s3");
    }
}
