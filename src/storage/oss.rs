//! Aliyun OSS storage backend over the OSS REST API
//!
//! Requests are signed with the OSS header scheme
//! (`Authorization: OSS <AccessKeyId>:<Signature>`), download locators with
//! query-string signing. Both use `Base64(HMAC-SHA1(secret, StringToSign))`
//! where
//!
//! ```text
//! StringToSign = VERB + "\n" + Content-MD5 + "\n" + Content-Type + "\n" +
//!                Date|Expires + "\n" + CanonicalizedResource
//! ```

use crate::error::{Error, Result};
use crate::storage::{http_client, locator, normalize_endpoint, Store, LOCATOR_TTL};
use crate::types::{BucketListing, ObjectLocator, ObjectPage, StorageEndpointConfig};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use sha1::Sha1;
use std::time::Duration;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// Everything but unreserved characters is escaped inside a key segment
const KEY_SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const BUCKET_WAIT_INTERVAL: Duration = Duration::from_secs(2);
const BUCKET_WAIT_ATTEMPTS: u32 = 20;

/// Aliyun OSS storage backend
#[derive(Clone)]
pub struct OssStore {
    http: reqwest::Client,
    access_key_id: String,
    secret_key: String,
    /// `http` or `https`
    scheme: String,
    /// Region endpoint host, e.g. `oss-cn-hangzhou.aliyuncs.com`
    host: String,
    /// `bucket.host` addressing; IP and localhost endpoints use `host/bucket`
    virtual_host: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAllMyBucketsResult {
    #[serde(default)]
    buckets: Option<BucketList>,
}

#[derive(Debug, Deserialize)]
struct BucketList {
    #[serde(rename = "Bucket", default)]
    bucket: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketEntry {
    name: String,
    #[serde(default)]
    creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<ObjectEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectEntry {
    key: String,
}

impl OssStore {
    /// Create a new OSS backend
    pub fn new(cfg: &StorageEndpointConfig) -> Result<Self> {
        if cfg.endpoint.trim().is_empty() {
            return Err(Error::config("oss endpoint must not be empty"));
        }

        let endpoint = Url::parse(&normalize_endpoint(&cfg.endpoint))
            .map_err(|e| Error::config(format!("invalid oss endpoint '{}': {}", cfg.endpoint, e)))?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(Error::config(format!(
                    "oss endpoint '{}' has no host",
                    cfg.endpoint
                )))
            }
        };

        let virtual_host = matches!(
            endpoint.host(),
            Some(url::Host::Domain(domain)) if !domain.eq_ignore_ascii_case("localhost")
        );

        Ok(Self {
            http: http_client("oss")?,
            access_key_id: cfg.access_key_id.clone(),
            secret_key: cfg.secret_key.clone(),
            scheme: endpoint.scheme().to_string(),
            host,
            virtual_host,
        })
    }

    /// Service-level URL (used for ListBuckets)
    fn service_url(&self) -> Result<Url> {
        parse_url(&format!("{}://{}/", self.scheme, self.host))
    }

    /// URL of a bucket, optionally addressing one object by its encoded key path
    fn bucket_url(&self, bucket: &str, key_path: Option<&str>) -> Result<Url> {
        let key_path = key_path.unwrap_or("");
        if self.virtual_host {
            parse_url(&format!("{}://{}.{}/{}", self.scheme, bucket, self.host, key_path))
        } else {
            parse_url(&format!("{}://{}/{}/{}", self.scheme, self.host, bucket, key_path))
        }
    }

    fn sign(&self, string_to_sign: &str) -> std::result::Result<String, String> {
        sign(&self.secret_key, string_to_sign)
    }

    /// Build a signed GET URL for an object that expires at `expires` (unix seconds)
    pub fn signed_url(&self, bucket: &str, key: &str, expires: i64) -> Result<Url> {
        let key_path = encode_key(key).map_err(|e| Error::resolve(key, e))?;
        let resource = canonical_resource(bucket, key, None);
        let signature = self
            .sign(&string_to_sign("GET", "", &expires.to_string(), &resource))
            .map_err(|e| Error::resolve(key, e))?;

        let mut url = self
            .bucket_url(bucket, Some(&key_path))
            .map_err(|e| Error::resolve(key, e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("OSSAccessKeyId", &self.access_key_id)
            .append_pair("Expires", &expires.to_string())
            .append_pair("Signature", &signature);
        Ok(url)
    }

    /// Send a header-signed request and return the response if it succeeded
    async fn send(
        &self,
        method: Method,
        url: Url,
        resource: &str,
        body: Option<bytes::Bytes>,
    ) -> std::result::Result<reqwest::Response, RequestError> {
        let date = http_date();
        let signature = self
            .sign(&string_to_sign(method.as_str(), "", &date, resource))
            .map_err(RequestError::Transport)?;

        let mut request = self
            .http
            .request(method, url)
            .header("Date", date.as_str())
            .header(
                "Authorization",
                format!("OSS {}:{}", self.access_key_id, signature),
            );
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RequestError::Status(status, error_code(&body)))
        }
    }

    async fn wait_until_bucket_exists(&self, bucket: &str) -> Result<()> {
        for attempt in 1..=BUCKET_WAIT_ATTEMPTS {
            if self.bucket_exists(bucket).await {
                return Ok(());
            }
            tracing::debug!(bucket, attempt, "Bucket not visible yet");
            tokio::time::sleep(BUCKET_WAIT_INTERVAL).await;
        }
        Err(Error::create(
            bucket,
            format!("bucket not visible after {} attempts", BUCKET_WAIT_ATTEMPTS),
        ))
    }
}

/// Failure of a single OSS request
#[derive(Debug)]
enum RequestError {
    Transport(String),
    Status(StatusCode, String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Transport(message) => write!(f, "{}", message),
            RequestError::Status(status, code) => write!(f, "HTTP {} {}", status, code),
        }
    }
}

#[async_trait]
impl Store for OssStore {
    fn name(&self) -> &'static str {
        "oss"
    }

    async fn list_buckets(&self) -> Result<BucketListing> {
        let response = self
            .send(Method::GET, self.service_url()?, "/", None)
            .await
            .map_err(|e| Error::unavailable("oss", e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::unavailable("oss", e.to_string()))?;

        let result: ListAllMyBucketsResult = quick_xml::de::from_str(&body)
            .map_err(|e| Error::unavailable("oss", format!("decoding bucket list: {}", e)))?;

        let bucket_names = result
            .buckets
            .map(|b| b.bucket)
            .unwrap_or_default()
            .into_iter()
            .map(|b| {
                tracing::info!(bucket = %b.name, created = ?b.creation_date, "Found bucket");
                b.name
            })
            .collect();

        Ok(BucketListing { bucket_names })
    }

    async fn bucket_exists(&self, bucket: &str) -> bool {
        let mut url = match self.bucket_url(bucket, None) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(bucket, error = %e, "Bucket probe failed");
                return false;
            }
        };
        url.set_query(Some("bucketInfo"));
        let resource = canonical_resource(bucket, "", Some("bucketInfo"));

        match self.send(Method::GET, url, &resource, None).await {
            Ok(_) => true,
            Err(RequestError::Status(StatusCode::NOT_FOUND, _)) => false,
            Err(e) => {
                tracing::warn!(bucket, error = %e, "Bucket probe failed");
                false
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let url = self.bucket_url(bucket, None)?;
        let resource = canonical_resource(bucket, "", None);

        self.send(Method::PUT, url, &resource, Some(bytes::Bytes::new()))
            .await
            .map_err(|e| Error::create(bucket, e.to_string()))?;

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

        let mut url = self.bucket_url(container, None)?;
        {
            let mut query = url.query_pairs_mut();
            if !cursor.is_empty() {
                query.append_pair("marker", cursor);
            }
            if !prefix.is_empty() {
                query.append_pair("prefix", prefix);
            }
        }
        let resource = canonical_resource(container, "", None);

        let response = self
            .send(Method::GET, url, &resource, None)
            .await
            .map_err(|e| Error::list(container, e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::list(container, e.to_string()))?;

        parse_list_objects(&body, cursor).map_err(|e| Error::list(container, e))
    }

    async fn resolve_locator(&self, container: &str, object_name: &str) -> Result<ObjectLocator> {
        let expires = chrono::Utc::now().timestamp() + LOCATOR_TTL.as_secs() as i64;
        let url = self.signed_url(container, object_name, expires)?;
        Ok(ObjectLocator::RemoteHttp(url.to_string()))
    }

    async fn upload_object(
        &self,
        locator: &ObjectLocator,
        dest_container: &str,
        dest_object_name: &str,
    ) -> Result<()> {
        let data = locator::fetch(&self.http, locator).await?;
        let size = data.len();

        let key_path =
            encode_key(dest_object_name).map_err(|e| Error::transfer(dest_object_name, e))?;
        let url = self
            .bucket_url(dest_container, Some(&key_path))
            .map_err(|e| Error::transfer(dest_object_name, e.to_string()))?;
        let resource = canonical_resource(dest_container, dest_object_name, None);
        self.send(Method::PUT, url, &resource, Some(data))
            .await
            .map_err(|e| Error::transfer(dest_object_name, e.to_string()))?;

        tracing::info!(bucket = dest_container, object = dest_object_name, size, "Uploaded object");
        Ok(())
    }
}

fn parse_url(s: &str) -> Result<Url> {
    Url::parse(s).map_err(|e| Error::config(format!("invalid oss url '{}': {}", s, e)))
}

/// Percent-encode an object key segment by segment for use as a URL path
///
/// `.` and `..` segments are refused: URL parsing collapses them (even when
/// escaped), so the request would reach a different object than the one
/// signed.
fn encode_key(key: &str) -> std::result::Result<String, String> {
    let key = key.trim_start_matches('/');
    let mut segments = Vec::new();
    for segment in key.split('/') {
        if segment == "." || segment == ".." {
            return Err(format!("key '{}' has a '{}' path segment", key, segment));
        }
        segments.push(utf8_percent_encode(segment, KEY_SEGMENT_ENCODE_SET).to_string());
    }
    Ok(segments.join("/"))
}

/// Decode a ListObjects response into a page
fn parse_list_objects(body: &str, cursor: &str) -> std::result::Result<ObjectPage, String> {
    let result: ListBucketResult = quick_xml::de::from_str(body)
        .map_err(|e| format!("decoding object list: {}", e))?;

    let object_names = result.contents.into_iter().map(|o| o.key).collect();
    Ok(ObjectPage::from_listing(
        object_names,
        result.is_truncated,
        result.next_marker,
        cursor,
    ))
}

/// Pull the `<Code>` out of an OSS error document
fn error_code(body: &str) -> String {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct OssError {
        code: String,
    }

    quick_xml::de::from_str::<OssError>(body)
        .map(|e| e.code)
        .unwrap_or_default()
}

/// `/bucket/key[?subresource]`
fn canonical_resource(bucket: &str, key: &str, sub_resource: Option<&str>) -> String {
    let mut resource = format!("/{}/{}", bucket, key.trim_start_matches('/'));
    if let Some(sub) = sub_resource {
        resource.push('?');
        resource.push_str(sub);
    }
    resource
}

fn string_to_sign(verb: &str, content_type: &str, date: &str, resource: &str) -> String {
    format!("{verb}\n\n{content_type}\n{date}\n{resource}")
}

fn sign(secret: &str, string_to_sign: &str) -> std::result::Result<String, String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("invalid signing key: {}", e))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Current time in RFC 1123 format, as the `Date` header wants it
fn http_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
