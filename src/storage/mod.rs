//! Storage backends for bucketsync
//!
//! Every backend implements [`Store`]. The sync engine only ever talks to a
//! `dyn Store`, so backend quirks (pagination, addressing, signing) stay in
//! the adapters.

pub mod ceph;
pub mod local;
pub mod locator;
pub mod oss;

use crate::error::Result;
use crate::types::{BucketListing, ObjectLocator, ObjectPage, SourceKind, StorageEndpointConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use ceph::CephStore;
pub use local::LocalStore;
pub use oss::OssStore;

/// Validity of generated download URLs
pub const LOCATOR_TTL: Duration = Duration::from_secs(15 * 60);

/// Capability every storage backend provides
#[async_trait]
pub trait Store: Send + Sync {
    /// Get the name of this backend (for logging)
    fn name(&self) -> &'static str;

    /// List all buckets visible to the configured credentials
    async fn list_buckets(&self) -> Result<BucketListing>;

    /// Check whether a bucket exists
    ///
    /// Probe failures are reported as "does not exist".
    async fn bucket_exists(&self, bucket: &str) -> bool;

    /// Create a bucket and wait until it is visible
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// List one page of objects under `prefix`, starting after `cursor`
    async fn list_objects(&self, container: &str, cursor: &str, prefix: &str)
        -> Result<ObjectPage>;

    /// Produce a locator from which the object's bytes can be fetched
    async fn resolve_locator(&self, container: &str, object_name: &str) -> Result<ObjectLocator>;

    /// Fetch the bytes behind `locator` and write them to `dest_container/dest_object_name`
    ///
    /// The payload is fully buffered in memory before the write.
    async fn upload_object(
        &self,
        locator: &ObjectLocator,
        dest_container: &str,
        dest_object_name: &str,
    ) -> Result<()>;
}

/// Build the store for the sync source
pub fn create_source_store(
    kind: SourceKind,
    endpoint: &StorageEndpointConfig,
) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match kind {
        SourceKind::Ceph => Arc::new(CephStore::new(endpoint)?),
        SourceKind::Oss => Arc::new(OssStore::new(endpoint)?),
        SourceKind::Local => Arc::new(LocalStore::new()?),
    };
    tracing::debug!(backend = store.name(), "Created source store");
    Ok(store)
}

/// Build the store for the sync target (always S3-compatible)
pub fn create_target_store(endpoint: &StorageEndpointConfig) -> Result<Arc<dyn Store>> {
    let store = CephStore::new(endpoint)?;
    tracing::debug!(endpoint = %endpoint.endpoint, "Created target store");
    Ok(Arc::new(store))
}

/// Prepend a scheme to bare `host[:port]` endpoints
pub(crate) fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

/// HTTP client used to dereference remote locators
pub(crate) fn http_client(backend: &'static str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| crate::error::Error::unavailable(backend, format!("building HTTP client: {}", e)))
}
