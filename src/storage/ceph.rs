//! S3-compatible (Ceph RGW) storage backend

use crate::error::{Error, Result};
use crate::storage::{http_client, locator, normalize_endpoint, Store, LOCATOR_TTL};
use crate::types::{BucketListing, ObjectLocator, ObjectPage, StorageEndpointConfig};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;

/// Region reported to the service; RGW ignores it but signing needs one
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Delay between visibility probes after bucket creation
const BUCKET_WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// Visibility probes before giving up on a new bucket
const BUCKET_WAIT_ATTEMPTS: u32 = 20;

/// S3-compatible storage backend
#[derive(Clone, Debug)]
pub struct CephStore {
    /// S3 client
    client: Client,
    /// Plain HTTP client for dereferencing signed URLs
    http: reqwest::Client,
}

impl CephStore {
    /// Create a new backend from static credentials and an endpoint
    pub fn new(cfg: &StorageEndpointConfig) -> Result<Self> {
        if cfg.endpoint.trim().is_empty() {
            return Err(Error::config("ceph endpoint must not be empty"));
        }

        let credentials = Credentials::new(
            &cfg.access_key_id,
            &cfg.secret_key,
            None, // session token
            None, // expiration
            "bucketsync-properties",
        );

        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(DEFAULT_S3_REGION))
            .endpoint_url(normalize_endpoint(&cfg.endpoint))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            http: http_client("ceph")?,
        })
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| Error::unavailable("ceph", sdk_message(e)))
    }

    /// Poll until a freshly created bucket answers HEAD
    async fn wait_until_bucket_exists(&self, bucket: &str) -> Result<()> {
        for attempt in 1..=BUCKET_WAIT_ATTEMPTS {
            match self.head_bucket(bucket).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(bucket, attempt, error = %e, "Bucket not visible yet");
                }
            }
            tokio::time::sleep(BUCKET_WAIT_INTERVAL).await;
        }

        Err(Error::create(
            bucket,
            format!(
                "bucket not visible after {} attempts",
                BUCKET_WAIT_ATTEMPTS
            ),
        ))
    }
}

#[async_trait]
impl Store for CephStore {
    fn name(&self) -> &'static str {
        "ceph"
    }

    async fn list_buckets(&self) -> Result<BucketListing> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| Error::unavailable("ceph", sdk_message(e)))?;

        let mut bucket_names = Vec::new();
        for bucket in output.buckets() {
            if let Some(name) = bucket.name() {
                tracing::info!(
                    bucket = name,
                    created = ?bucket.creation_date(),
                    "Found bucket"
                );
                bucket_names.push(name.to_string());
            }
        }

        Ok(BucketListing { bucket_names })
    }

    async fn bucket_exists(&self, bucket: &str) -> bool {
        match self.head_bucket(bucket).await {
            Ok(()) => {
                tracing::info!(bucket, "Bucket exists");
                true
            }
            Err(e) => {
                tracing::warn!(bucket, error = %e, "Bucket probe failed");
                false
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| Error::create(bucket, sdk_message(e)))?;

        tracing::info!(bucket, "Waiting for bucket to be created");
        self.wait_until_bucket_exists(bucket).await?;
        tracing::info!(bucket, "Bucket created");
        Ok(())
    }

    async fn list_objects(
        &self,
        container: &str,
        cursor: &str,
        prefix: &str,
    ) -> Result<ObjectPage> {
        tracing::debug!(bucket = container, marker = cursor, prefix, "Listing objects");

        let output = self
            .client
            .list_objects()
            .bucket(container)
            .prefix(prefix)
            .set_marker((!cursor.is_empty()).then(|| cursor.to_string()))
            .send()
            .await
            .map_err(|e| Error::list(container, sdk_message(e)))?;

        let object_names: Vec<String> = output
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();

        Ok(ObjectPage::from_listing(
            object_names,
            output.is_truncated().unwrap_or(false),
            output.next_marker().map(str::to_string),
            cursor,
        ))
    }

    async fn resolve_locator(&self, container: &str, object_name: &str) -> Result<ObjectLocator> {
        let presign = PresigningConfig::expires_in(LOCATOR_TTL)
            .map_err(|e| Error::resolve(object_name, e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(container)
            .key(object_name)
            .presigned(presign)
            .await
            .map_err(|e| Error::resolve(object_name, sdk_message(e)))?;

        Ok(ObjectLocator::RemoteHttp(request.uri().to_string()))
    }

    async fn upload_object(
        &self,
        locator: &ObjectLocator,
        dest_container: &str,
        dest_object_name: &str,
    ) -> Result<()> {
        let data = locator::fetch(&self.http, locator).await?;
        let size = data.len();

        self.client
            .put_object()
            .bucket(dest_container)
            .key(dest_object_name)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::transfer(dest_object_name, sdk_message(e)))?;

        tracing::info!(bucket = dest_container, object = dest_object_name, size, "Uploaded object");
        Ok(())
    }
}

/// Render an SDK error with its full source chain
fn sdk_message<E: std::error::Error>(err: E) -> String {
    DisplayErrorContext(err).to_string()
}
