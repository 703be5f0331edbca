//! Local filesystem storage backend
//!
//! A container is a directory. Listing walks the whole tree and returns every
//! file in a single, exhausted page; object names are `/`-separated paths
//! relative to the directory.

use crate::error::{Error, Result};
use crate::storage::{http_client, locator, Store};
use crate::types::{BucketListing, ObjectLocator, ObjectPage};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Local filesystem storage backend
#[derive(Clone, Debug)]
pub struct LocalStore {
    /// Used when the locator handed to `upload_object` is a remote URL
    http: reqwest::Client,
}

impl LocalStore {
    /// Create a new local backend
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client("local")?,
        })
    }

    /// Resolve an object name inside a container directory
    fn resolve(container: &str, object_name: &str) -> PathBuf {
        Path::new(container).join(object_name.trim_start_matches('/'))
    }
}

/// Walk `root` and collect relative file names starting with `prefix`
fn walk_files(root: &Path, prefix: &str) -> std::result::Result<Vec<String>, String> {
    if !root.is_dir() {
        return Err(format!("{} is not a directory", root.display()));
    }

    let mut names = Vec::new();
    for entry in jwalk::WalkDir::new(root)
        .sort(true)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::RayonNewPool(num_cpus::get()))
    {
        let entry = entry.map_err(|e| e.to_string())?;
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        // Links are not followed while walking; keep only those that end at a file
        if entry.file_type().is_symlink() && !points_to_file(&path) {
            tracing::debug!(path = %path.display(), "Skipping link that does not point to a file");
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(&path);
        let name = object_name(relative);
        if name.is_empty() || !name.starts_with(prefix) {
            continue;
        }
        names.push(name);
    }

    Ok(names)
}

fn points_to_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Join path components with `/` regardless of platform
fn object_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl Store for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_buckets(&self) -> Result<BucketListing> {
        Ok(BucketListing::default())
    }

    async fn bucket_exists(&self, container: &str) -> bool {
        fs::metadata(container)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn create_bucket(&self, container: &str) -> Result<()> {
        fs::create_dir_all(container)
            .await
            .map_err(|e| Error::create(container, e.to_string()))
    }

    async fn list_objects(
        &self,
        container: &str,
        _cursor: &str,
        prefix: &str,
    ) -> Result<ObjectPage> {
        let root = PathBuf::from(container);
        let prefix = prefix.to_string();

        let names = tokio::task::spawn_blocking(move || walk_files(&root, &prefix))
            .await
            .map_err(|e| Error::list(container, format!("directory walk panicked: {}", e)))?
            .map_err(|e| Error::list(container, e))?;

        tracing::info!(dir = container, files = names.len(), "Listed local directory");
        Ok(ObjectPage::last(names))
    }

    async fn resolve_locator(&self, container: &str, object_name: &str) -> Result<ObjectLocator> {
        let path = Self::resolve(container, object_name);
        if path.is_absolute() {
            return Ok(ObjectLocator::LocalPath(path));
        }

        let cwd = std::env::current_dir()
            .map_err(|e| Error::resolve(object_name, format!("current directory: {}", e)))?;
        Ok(ObjectLocator::LocalPath(cwd.join(path)))
    }

    async fn upload_object(
        &self,
        locator: &ObjectLocator,
        dest_container: &str,
        dest_object_name: &str,
    ) -> Result<()> {
        let data = locator::fetch(&self.http, locator).await?;
        let full_path = Self::resolve(dest_container, dest_object_name);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::transfer(dest_object_name, format!("creating directories: {}", e)))?;
        }

        fs::write(&full_path, &data)
            .await
            .map_err(|e| Error::transfer(dest_object_name, format!("writing file: {}", e)))?;

        tracing::info!(dir = dest_container, object = dest_object_name, size = data.len(), "Wrote object");
        Ok(())
    }
}
