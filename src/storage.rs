use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;

use crate::{config::AppConfig, error::BlogError};

/// Lifetime of a presigned image upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// StorageService
///
/// Object storage for post images. Clients upload bytes straight to the bucket through a
/// presigned URL; this service only hands out URLs and keys.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if needed. Only called in `Env::Local` (MinIO).
    async fn ensure_bucket_exists(&self);

    /// Returns a time-limited PUT URL for `key`, pinned to `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, BlogError>;
}

/// Bucket prefix of every post image.
pub const IMAGE_KEY_PREFIX: &str = "posts_images/";

/// Post images only.
pub fn is_allowed_image_type(content_type: &str) -> bool {
    matches!(
        content_type,
        "image/jpeg" | "image/png" | "image/gif" | "image/webp"
    )
}

/// image_object_key
///
/// Builds the bucket key for a new post image from the client's filename. Only the
/// extension survives, so user input never becomes a path component.
pub fn image_object_key(filename: &str, id: uuid::Uuid) -> String {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    format!("{}{}.{}", IMAGE_KEY_PREFIX, id, extension)
}

/// S3StorageClient
///
/// AWS SDK client against any S3-compatible endpoint. Path-style addressing is forced for
/// MinIO compatibility.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    /// Builds a client for the bucket described by the `s3_*` configuration fields.
    pub async fn from_config(config: &AppConfig) -> Self {
        let credentials = s3::config::Credentials::new(
            &config.s3_key,
            &config.s3_secret,
            None,
            None,
            "blogicum-config",
        );

        let sdk_config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .region(s3::config::Region::new(config.s3_region.clone()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(sdk_config),
            bucket_name: config.s3_bucket.clone(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket on an existing bucket fails harmlessly.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket: {:?}", e);
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, BlogError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| BlogError::Storage(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            // The uploader must send exactly this Content-Type.
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| BlogError::Storage(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments from an object key.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// Deterministic stand-in used by the tests and by local runs without object storage.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every call fails.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, BlogError> {
        if self.should_fail {
            return Err(BlogError::Storage("mock storage failure".to_string()));
        }

        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}

/// StorageState
///
/// The shared handle to object storage held by `AppState`.
pub type StorageState = Arc<dyn StorageService>;
