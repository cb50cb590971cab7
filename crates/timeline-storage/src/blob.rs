//! S3-compatible blob store implementation.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};
use uuid::Uuid;

use timeline_models::{MediaKind, MediaLocator};

use crate::error::{StorageError, StorageResult};
use crate::store::MediaStore;

/// How long presigned GET URLs stay valid when no public base URL is set.
const PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Configuration for the blob store.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" for R2-style endpoints)
    pub region: String,
    /// Public base URL for the bucket. When set, locators are plain URLs
    /// under this base; otherwise uploads get presigned GET URLs.
    pub public_base_url: Option<String>,
}

impl BlobConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("BLOB_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("BLOB_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("BLOB_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("BLOB_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("BLOB_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("BLOB_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("BLOB_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("BLOB_BUCKET_NAME not set"))?,
            region: std::env::var("BLOB_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("BLOB_PUBLIC_BASE_URL").ok(),
        })
    }
}

/// Media blob store backed by an S3-compatible bucket.
#[derive(Clone)]
pub struct BlobStore {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl BlobStore {
    /// Create a new blob store from configuration.
    pub async fn new(config: BlobConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "blob",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            bucket: config.bucket_name,
            public_base_url: config.public_base_url,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = BlobConfig::from_env()?;
        Self::new(config).await
    }

    /// Upload bytes under a key.
    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    /// Generate a presigned URL for GET.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Resolve the stable locator for a freshly uploaded key.
    async fn locator_for(&self, key: &str) -> StorageResult<MediaLocator> {
        match &self.public_base_url {
            Some(base) => Ok(MediaLocator::new(public_locator(base, key))),
            None => {
                let url = self.presign_get(key, PRESIGN_TTL).await?;
                Ok(MediaLocator::new(url))
            }
        }
    }
}

#[async_trait]
impl MediaStore for BlobStore {
    async fn store(&self, payload: Vec<u8>, kind: MediaKind) -> StorageResult<MediaLocator> {
        let key = object_key(kind, Uuid::new_v4());

        self.upload_bytes(payload, &key, kind.content_type()).await?;
        let locator = self.locator_for(&key).await?;

        info!("Stored {} media at {}", kind.as_str(), key);
        Ok(locator)
    }
}

/// Object key for a media payload: kind namespace plus a random ID.
fn object_key(kind: MediaKind, id: Uuid) -> String {
    format!("{}/{}", kind.as_str(), id)
}

/// Public URL for a key under a base URL.
fn public_locator(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}
