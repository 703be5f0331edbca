//! Sync engine and orchestration
//!
//! One control flow lists the source page by page. For every page it spawns
//! one transfer task per object and waits for all of them before asking for
//! the next page, so pages never interleave and at most one page of objects
//! is in flight. There is no cap on tasks within a page: a backend returning
//! large pages means as many concurrent fetches and buffered payloads.

pub mod cursor;
pub mod provision;

#[cfg(test)]
pub(crate) mod fake;

use crate::error::{Error, Result};
use crate::storage::Store;
use crate::types::{ObjectPage, SourceKind, SyncJobSpec, SyncStats};
use cursor::{ListingCursor, PageStatus};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Result of transferring one page
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PageOutcome {
    transferred: u64,
    failed: u64,
}

/// Outcome of a cluster-wide sync
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    /// Stats summed over all buckets that ran
    pub stats: SyncStats,
    /// Buckets whose sync aborted with a job-level error
    pub failed_buckets: Vec<String>,
}

/// The main sync engine
pub struct SyncEngine {
    /// Source storage backend
    source: Arc<dyn Store>,
    /// Destination storage backend
    target: Arc<dyn Store>,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(source: Arc<dyn Store>, target: Arc<dyn Store>) -> Self {
        Self { source, target }
    }

    /// Mirror one bucket or directory tree onto the target bucket
    ///
    /// Listing and provisioning errors abort the run. Per-object failures are
    /// logged, counted in [`SyncStats::errors`] and otherwise ignored.
    pub async fn sync_bucket(&self, job: &SyncJobSpec) -> Result<SyncStats> {
        let start = Instant::now();
        job.validate()?;
        let source_container = job
            .source_container()
            .ok_or_else(|| Error::config("no source container"))?;

        tracing::info!(
            source = %source_container,
            source_backend = self.source.name(),
            target = %job.target_bucket,
            "Starting bucket sync"
        );

        if let Err(e) = provision::ensure_bucket(self.target.as_ref(), &job.target_bucket).await {
            tracing::error!(bucket = %job.target_bucket, error = %e, "Create bucket failed");
            return Err(e);
        }

        let mut stats = SyncStats::default();
        let mut cursor =
            ListingCursor::new(self.source.as_ref(), &source_container, &job.source_prefix);

        loop {
            let next = match cursor.next_page().await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(
                        source_kind = %job.source_kind,
                        container = %source_container,
                        error = %e,
                        "List objects failed"
                    );
                    return Err(e);
                }
            };
            let Some((page, status)) = next else {
                break;
            };

            stats.pages += 1;
            stats.objects_listed += page.len() as u64;
            tracing::info!(
                page = stats.pages,
                objects = page.len(),
                bucket = %job.target_bucket,
                "Syncing page"
            );

            let outcome = self.transfer_page(job, &source_container, page).await;
            stats.objects_transferred += outcome.transferred;
            stats.errors += outcome.failed;

            if status == PageStatus::Stalled {
                stats.stalled = true;
            }
        }

        tracing::info!(
            pages = stats.pages,
            transferred = stats.objects_transferred,
            errors = stats.errors,
            stalled = stats.stalled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Bucket sync finished"
        );
        Ok(stats)
    }

    /// Mirror every bucket of the source onto a same-named target bucket
    ///
    /// Prefixes from `template` apply to every bucket; its bucket fields are
    /// ignored. A bucket that fails at job level is recorded and skipped.
    pub async fn sync_cluster(&self, template: &SyncJobSpec) -> Result<ClusterSummary> {
        if template.source_kind == SourceKind::Local {
            return Err(Error::config("cluster sync needs a bucket-based source"));
        }

        let listing = self.source.list_buckets().await?;
        tracing::info!(buckets = listing.bucket_names.len(), "Starting cluster sync");

        let mut summary = ClusterSummary::default();
        for bucket in listing.bucket_names {
            let job = SyncJobSpec {
                source_bucket: Some(bucket.clone()),
                source_dir: None,
                target_bucket: bucket.clone(),
                ..template.clone()
            };

            match self.sync_bucket(&job).await {
                Ok(stats) => summary.stats.merge(&stats),
                Err(e) => {
                    tracing::error!(bucket = %bucket, error = %e, "Bucket sync aborted");
                    summary.failed_buckets.push(bucket);
                }
            }
        }

        Ok(summary)
    }

    /// Transfer every object of a page concurrently and wait for all of them
    async fn transfer_page(
        &self,
        job: &SyncJobSpec,
        source_container: &str,
        page: ObjectPage,
    ) -> PageOutcome {
        let mut tasks = JoinSet::new();

        for object_name in page.object_names {
            let dest_name = job.destination_name(&object_name);
            let source = Arc::clone(&self.source);
            let target = Arc::clone(&self.target);
            let source_container = source_container.to_string();
            let target_bucket = job.target_bucket.clone();

            tasks.spawn(async move {
                let result = transfer_object(
                    source.as_ref(),
                    target.as_ref(),
                    &source_container,
                    &object_name,
                    &target_bucket,
                    &dest_name,
                )
                .await;
                (object_name, dest_name, result)
            });
        }

        let mut outcome = PageOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, _, Ok(()))) => outcome.transferred += 1,
                Ok((object, dest, Err(e))) => {
                    tracing::error!(
                        object = %object,
                        dest = %dest,
                        bucket = %job.target_bucket,
                        error = %e,
                        "Upload object failed"
                    );
                    outcome.failed += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Transfer task did not complete");
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }
}

/// Resolve one object's locator on the source and upload it to the target
async fn transfer_object(
    source: &dyn Store,
    target: &dyn Store,
    source_container: &str,
    object_name: &str,
    target_bucket: &str,
    dest_name: &str,
) -> Result<()> {
    let locator = source.resolve_locator(source_container, object_name).await?;
    tracing::debug!(object = object_name, kind = locator.kind(), "Resolved locator");
    target.upload_object(&locator, target_bucket, dest_name).await
}
