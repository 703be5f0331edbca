//! Core domain types for bucketsync

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Credentials and address of one object service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEndpointConfig {
    pub access_key_id: String,
    pub secret_key: String,
    pub endpoint: String,
}

impl StorageEndpointConfig {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_key: secret_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

// Keep the secret out of log lines.
impl fmt::Debug for StorageEndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEndpointConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Names of all buckets visible to a set of credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketListing {
    pub bucket_names: Vec<String>,
}

/// One page of an object listing
///
/// An exhausted page carries no cursor; a non-exhausted page always does.
/// The constructors are the only way adapters build pages so that invariant
/// holds everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPage {
    pub object_names: Vec<String>,
    pub exhausted: bool,
    pub next_cursor: Option<String>,
}

impl ObjectPage {
    /// Terminal page
    pub fn last(object_names: Vec<String>) -> Self {
        Self {
            object_names,
            exhausted: true,
            next_cursor: None,
        }
    }

    /// Page followed by more results starting after `next_cursor`
    pub fn more(object_names: Vec<String>, next_cursor: impl Into<String>) -> Self {
        Self {
            object_names,
            exhausted: false,
            next_cursor: Some(next_cursor.into()),
        }
    }

    /// Build a page from a truncated/not-truncated listing response
    ///
    /// When the backend reports truncation without an explicit next marker,
    /// the last key of the page is used instead. A truncated page with no
    /// keys keeps the request `cursor`, which the cursor engine then
    /// reports as a stalled listing.
    pub fn from_listing(
        object_names: Vec<String>,
        truncated: bool,
        next_marker: Option<String>,
        cursor: &str,
    ) -> Self {
        if !truncated {
            return Self::last(object_names);
        }

        let next = next_marker
            .filter(|m| !m.is_empty())
            .or_else(|| object_names.last().cloned())
            .unwrap_or_else(|| cursor.to_string());
        Self::more(object_names, next)
    }

    pub fn len(&self) -> usize {
        self.object_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_names.is_empty()
    }
}

/// How to fetch one object's bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectLocator {
    /// Pre-signed, time-boxed GET URL
    RemoteHttp(String),
    /// Absolute path on the local filesystem
    LocalPath(PathBuf),
}

impl ObjectLocator {
    /// Short name of the locator kind (for logging)
    pub fn kind(&self) -> &'static str {
        match self {
            ObjectLocator::RemoteHttp(_) => "http",
            ObjectLocator::LocalPath(_) => "file",
        }
    }
}

/// Backend variant of the sync source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// S3-compatible object service
    Ceph,
    /// Aliyun OSS
    Oss,
    /// Local directory tree
    Local,
}

impl SourceKind {
    /// Parse a source kind, ignoring case
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ceph" | "s3" => Ok(SourceKind::Ceph),
            "oss" => Ok(SourceKind::Oss),
            "local" => Ok(SourceKind::Local),
            other => Err(Error::config(format!(
                "unsupported source type: '{}'. Supported: ceph, oss, local",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Ceph => "ceph",
            SourceKind::Oss => "oss",
            SourceKind::Local => "local",
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, SourceKind::Local)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of one single-bucket sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJobSpec {
    pub source_kind: SourceKind,
    /// Source bucket, if the source is an object service
    pub source_bucket: Option<String>,
    /// Source directory, used when no source bucket is given
    pub source_dir: Option<PathBuf>,
    /// Listing filter applied on the source
    pub source_prefix: String,
    pub target_bucket: String,
    /// Prepended verbatim to every destination object name
    pub target_prefix: String,
}

impl SyncJobSpec {
    /// Check that the job names a source container and a target bucket
    pub fn validate(&self) -> Result<()> {
        if self.target_bucket.trim().is_empty() {
            return Err(Error::config("target bucket must not be empty"));
        }
        if self.source_container().is_none() {
            return Err(Error::config(
                "either a source bucket or a source directory is required",
            ));
        }
        Ok(())
    }

    /// Effective source container: the bucket if given, else the directory
    pub fn source_container(&self) -> Option<String> {
        match (&self.source_bucket, &self.source_dir) {
            (Some(bucket), _) if !bucket.is_empty() => Some(bucket.clone()),
            (_, Some(dir)) if !dir.as_os_str().is_empty() => {
                Some(dir.to_string_lossy().into_owned())
            }
            _ => None,
        }
    }

    /// Destination name for a source object: `target_prefix + name`
    pub fn destination_name(&self, object_name: &str) -> String {
        if self.target_prefix.is_empty() {
            object_name.to_string()
        } else {
            format!("{}{}", self.target_prefix, object_name)
        }
    }
}

/// Statistics for a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Listing pages processed
    pub pages: u64,

    /// Object names returned by the source listing
    pub objects_listed: u64,

    /// Objects written to the target
    pub objects_transferred: u64,

    /// Objects that failed to resolve or transfer
    pub errors: u64,

    /// Listing stopped because the cursor did not advance
    pub stalled: bool,
}

impl SyncStats {
    /// Fold the stats of another run into this one
    pub fn merge(&mut self, other: &SyncStats) {
        self.pages += other.pages;
        self.objects_listed += other.objects_listed;
        self.objects_transferred += other.objects_transferred;
        self.errors += other.errors;
        self.stalled |= other.stalled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(prefix: &str) -> SyncJobSpec {
        SyncJobSpec {
            source_kind: SourceKind::Local,
            source_bucket: None,
            source_dir: Some(PathBuf::from("/data")),
            source_prefix: String::new(),
            target_bucket: "mirror".to_string(),
            target_prefix: prefix.to_string(),
        }
    }

    #[test]
    fn test_destination_name() {
        assert_eq!(job("backup/").destination_name("a.txt"), "backup/a.txt");
        assert_eq!(job("").destination_name("a.txt"), "a.txt");
        // No path normalization
        assert_eq!(job("x").destination_name("/y//z"), "x/y//z");
    }

    #[test]
    fn test_source_container_prefers_bucket() {
        let mut spec = job("");
        assert_eq!(spec.source_container().as_deref(), Some("/data"));

        spec.source_bucket = Some("photos".to_string());
        assert_eq!(spec.source_container().as_deref(), Some("photos"));

        spec.source_bucket = Some(String::new());
        assert_eq!(spec.source_container().as_deref(), Some("/data"));
    }

    #[test]
    fn test_validate() {
        assert!(job("").validate().is_ok());

        let mut spec = job("");
        spec.source_dir = None;
        assert!(matches!(spec.validate(), Err(Error::Config { .. })));

        let mut spec = job("");
        spec.target_bucket = " ".to_string();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_page_from_listing() {
        let names = vec!["a".to_string(), "b".to_string()];

        let page = ObjectPage::from_listing(names.clone(), false, Some("zzz".into()), "");
        assert!(page.exhausted);
        assert_eq!(page.next_cursor, None);

        let page = ObjectPage::from_listing(names.clone(), true, Some("m".into()), "");
        assert_eq!(page.next_cursor.as_deref(), Some("m"));

        // Missing marker falls back to the last key
        let page = ObjectPage::from_listing(names.clone(), true, None, "");
        assert!(!page.exhausted);
        assert_eq!(page.next_cursor.as_deref(), Some("b"));

        let page = ObjectPage::from_listing(names, true, Some(String::new()), "");
        assert_eq!(page.next_cursor.as_deref(), Some("b"));

        // Nothing to advance to: the request cursor comes back unchanged
        let page = ObjectPage::from_listing(Vec::new(), true, None, "k-9");
        assert!(!page.exhausted);
        assert_eq!(page.next_cursor.as_deref(), Some("k-9"));

        let page = ObjectPage::from_listing(Vec::new(), true, None, "");
        assert!(!page.exhausted);
        assert_eq!(page.next_cursor.as_deref(), Some(""));
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!(SourceKind::parse("CEPH").unwrap(), SourceKind::Ceph);
        assert_eq!(SourceKind::parse("oss").unwrap(), SourceKind::Oss);
        assert_eq!(SourceKind::parse("Local").unwrap(), SourceKind::Local);
        assert!(SourceKind::parse("ftp").is_err());
        assert!(!SourceKind::Local.is_remote());
    }

    #[test]
    fn test_endpoint_debug_redacts_secret() {
        let cfg = StorageEndpointConfig::new("AKID", "s3cr3t", "http://ceph:7480");
        let shown = format!("{:?}", cfg);
        assert!(shown.contains("AKID"));
        assert!(!shown.contains("s3cr3t"));
    }

    #[test]
    fn test_stats_merge() {
        let mut total = SyncStats::default();
        total.merge(&SyncStats {
            pages: 2,
            objects_listed: 5,
            objects_transferred: 4,
            errors: 1,
            stalled: false,
        });
        total.merge(&SyncStats {
            pages: 1,
            stalled: true,
            ..Default::default()
        });
        assert_eq!(total.pages, 3);
        assert_eq!(total.errors, 1);
        assert!(total.stalled);
    }
}
