//! In-memory `Store` double for sync engine tests

use crate::error::{Error, Result};
use crate::storage::Store;
use crate::types::{BucketListing, ObjectLocator, ObjectPage};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted store: serves queued pages per container and records every call
#[derive(Default)]
pub struct FakeStore {
    pages: Mutex<HashMap<String, VecDeque<ObjectPage>>>,
    buckets: Mutex<HashSet<String>>,
    bucket_names: Vec<String>,
    created: Mutex<Vec<String>>,
    list_calls: Mutex<Vec<(String, String, String)>>,
    uploads: Mutex<Vec<(String, String, String)>>,
    fail_uploads: HashSet<String>,
    fail_resolves: HashSet<String>,
    fail_create: bool,
    upload_delay: Duration,
    in_flight: AtomicUsize,
    listed_during_transfer: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(self, container: &str, pages: Vec<ObjectPage>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(container.to_string(), pages.into());
        self
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.buckets.lock().unwrap().insert(bucket.to_string());
        self
    }

    pub fn with_bucket_names(mut self, names: &[&str]) -> Self {
        self.bucket_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing_upload(mut self, dest_name: &str) -> Self {
        self.fail_uploads.insert(dest_name.to_string());
        self
    }

    pub fn failing_resolve(mut self, object_name: &str) -> Self {
        self.fail_resolves.insert(object_name.to_string());
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    pub fn list_calls(&self) -> Vec<(String, String, String)> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn created_buckets(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    /// `(dest_container, dest_name, locator)` of every successful upload
    pub fn uploads(&self) -> Vec<(String, String, String)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.uploads().into_iter().map(|(_, n, _)| n).collect();
        names.sort();
        names
    }

    pub fn listed_during_transfer(&self) -> bool {
        self.listed_during_transfer.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for FakeStore {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn list_buckets(&self) -> Result<BucketListing> {
        Ok(BucketListing {
            bucket_names: self.bucket_names.clone(),
        })
    }

    async fn bucket_exists(&self, bucket: &str) -> bool {
        self.buckets.lock().unwrap().contains(bucket)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        if self.fail_create {
            return Err(Error::create(bucket, "access denied"));
        }
        self.created.lock().unwrap().push(bucket.to_string());
        self.buckets.lock().unwrap().insert(bucket.to_string());
        Ok(())
    }

    async fn list_objects(
        &self,
        container: &str,
        cursor: &str,
        prefix: &str,
    ) -> Result<ObjectPage> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            self.listed_during_transfer.store(true, Ordering::SeqCst);
        }
        self.list_calls.lock().unwrap().push((
            container.to_string(),
            cursor.to_string(),
            prefix.to_string(),
        ));

        self.pages
            .lock()
            .unwrap()
            .get_mut(container)
            .and_then(|queue| queue.pop_front())
            .ok_or_else(|| Error::list(container, "no such container"))
    }

    async fn resolve_locator(&self, container: &str, object_name: &str) -> Result<ObjectLocator> {
        if self.fail_resolves.contains(object_name) {
            return Err(Error::resolve(object_name, "signing failed"));
        }
        Ok(ObjectLocator::RemoteHttp(format!(
            "fake://{}/{}",
            container, object_name
        )))
    }

    async fn upload_object(
        &self,
        locator: &ObjectLocator,
        dest_container: &str,
        dest_object_name: &str,
    ) -> Result<()> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }

        let result = if self.fail_uploads.contains(dest_object_name) {
            Err(Error::transfer(dest_object_name, "connection reset"))
        } else {
            let locator = match locator {
                ObjectLocator::RemoteHttp(url) => url.clone(),
                ObjectLocator::LocalPath(path) => path.to_string_lossy().into_owned(),
            };
            self.uploads.lock().unwrap().push((
                dest_container.to_string(),
                dest_object_name.to_string(),
                locator,
            ));
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
