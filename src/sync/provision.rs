//! Destination bucket provisioning

use crate::error::Result;
use crate::storage::Store;

/// What `ensure_bucket` had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    AlreadyPresent,
    Created,
}

/// Make sure `bucket` exists on `store`, creating it if the probe says it doesn't
///
/// Creation blocks until the backend reports the bucket visible. Any creation
/// failure is returned to the caller, which aborts the job.
pub async fn ensure_bucket(store: &dyn Store, bucket: &str) -> Result<Provisioned> {
    if store.bucket_exists(bucket).await {
        tracing::debug!(bucket, "Target bucket already present");
        return Ok(Provisioned::AlreadyPresent);
    }

    tracing::info!(bucket, backend = store.name(), "Creating target bucket");
    store.create_bucket(bucket).await?;
    Ok(Provisioned::Created)
}
