use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::{presigning::PresigningConfig, primitives::ByteStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Presigned upload URLs stay valid for ten minutes.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(String),
}

// 1. StorageService Contract
/// StorageService
///
/// Object storage used for avatars, event banners and institution logos. The S3 client covers
/// MinIO locally and the backend's S3 gateway in production; the mock serves tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the bucket if missing. Only called at local startup.
    async fn ensure_bucket_exists(&self);

    /// Signed URL the browser can PUT a file to directly. The upload must carry
    /// `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Uploads bytes received by the server itself (small files such as avatars).
    async fn upload_object(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError>;

    /// Public URL under which a stored object is served.
    fn public_url(&self, key: &str) -> String;
}

// 2. The Real Implementation (S3/MinIO/Supabase)
/// S3StorageClient
///
/// AWS SDK client pointed at an S3-compatible endpoint. Path-style addressing is required by
/// both MinIO and the Supabase Storage gateway.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_base_url: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// CreateBucket is idempotent; an "already owned" answer is ignored.
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(error = ?e, bucket = %self.bucket_name, "create_bucket skipped");
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }

    async fn upload_object(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, sanitize_key(key))
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a user-influenced key cannot walk out of its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Unit Tests)
/// MockStorageService
///
/// In-memory storage for tests. Records the keys it was asked to upload.
#[derive(Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    uploads: Mutex<Vec<String>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploads
            .lock()
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }

    fn fail_if_requested(&self) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Request(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.fail_if_requested()?;
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }

    async fn upload_object(
        &self,
        key: &str,
        _content_type: &str,
        _body: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.fail_if_requested()?;
        if let Ok(mut keys) = self.uploads.lock() {
            keys.push(sanitize_key(key));
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://localhost:9000/mock-bucket/{}", sanitize_key(key))
    }
}

/// StorageState
///
/// Shared handle to the storage service held in `AppState`.
pub type StorageState = Arc<dyn StorageService>;
