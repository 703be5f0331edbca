//! Dereferencing object locators into bytes

use crate::error::{Error, Result};
use crate::types::ObjectLocator;
use bytes::Bytes;

/// Fetch the full payload behind a locator
///
/// Remote locators are fetched with a plain GET; non-success statuses are
/// errors so an error document never ends up stored as object content.
pub async fn fetch(http: &reqwest::Client, locator: &ObjectLocator) -> Result<Bytes> {
    match locator {
        ObjectLocator::RemoteHttp(url) => {
            let target = redact(url);
            let response = http
                .get(url.trim())
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| Error::transfer(target, format!("GET failed: {}", e.without_url())))?;

            response
                .bytes()
                .await
                .map_err(|e| Error::transfer(redact(url), format!("reading body: {}", e.without_url())))
        }
        ObjectLocator::LocalPath(path) => match tokio::fs::read(path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound { path: path.clone() })
            }
            Err(e) => Err(Error::transfer(
                path.to_string_lossy(),
                format!("reading file: {}", e),
            )),
        },
    }
}

/// Strip the signature query from a URL before it goes into logs or errors
pub fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => base.to_string(),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_redact_drops_query() {
        assert_eq!(
            redact("https://h/b/k?X-Amz-Signature=abc&X-Amz-Expires=900"),
            "https://h/b/k"
        );
        assert_eq!(redact("https://h/b/k"), "https://h/b/k");
    }

    #[tokio::test]
    async fn test_fetch_local_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.bin");
        std::fs::write(&path, [0u8, 1, 2, 255]).unwrap();

        let http = reqwest::Client::new();
        let data = fetch(&http, &ObjectLocator::LocalPath(path)).await.unwrap();
        assert_eq!(&data[..], &[0u8, 1, 2, 255]);
    }

    #[tokio::test]
    async fn test_fetch_missing_local_path() {
        let tmp = TempDir::new().unwrap();
        let http = reqwest::Client::new();
        let err = fetch(&http, &ObjectLocator::LocalPath(tmp.path().join("gone")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(!err.is_job_fatal());
    }
}
