//! Sync properties loading
//!
//! The properties file is TOML: a flat list of `key = "value"` pairs holding
//! the credentials and endpoints of both sides of a sync. Values must be
//! quoted, so a Java-style `key=value` file needs quotes added.

use crate::error::{Error, Result};
use crate::types::StorageEndpointConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name used when no `--config` path is given
pub const DEFAULT_PROPERTIES_FILE: &str = "sync.toml";

/// Typed contents of the sync properties file
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProperties {
    #[serde(default)]
    pub source_cluster_access_key: String,
    #[serde(default)]
    pub source_cluster_secret_key: String,
    #[serde(default)]
    pub source_cluster_endpoint: String,

    pub target_cluster_access_key: String,
    pub target_cluster_secret_key: String,
    pub target_cluster_endpoint: String,
}

impl std::fmt::Debug for SyncProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncProperties")
            .field("source", &self.source_endpoint())
            .field("target", &self.target_endpoint())
            .finish()
    }
}

impl SyncProperties {
    /// Load properties from the given file, or the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::default_path()?),
        }
    }

    /// Load properties from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("reading properties {}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }

    /// Parse properties from a string
    pub fn parse(contents: &str) -> Result<Self> {
        let props: Self = toml::from_str(contents)?;
        props.validate()?;
        Ok(props)
    }

    /// Get the default properties file path
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("bucketsync").join(DEFAULT_PROPERTIES_FILE))
            .ok_or_else(|| Error::config("could not determine config directory"))
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("target_cluster_access_key", &self.target_cluster_access_key),
            ("target_cluster_secret_key", &self.target_cluster_secret_key),
            ("target_cluster_endpoint", &self.target_cluster_endpoint),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::config(format!("property '{}' must not be empty", key)));
            }
        }
        Ok(())
    }

    /// Endpoint of the source side (fields may be empty for local sources)
    pub fn source_endpoint(&self) -> StorageEndpointConfig {
        StorageEndpointConfig::new(
            &self.source_cluster_access_key,
            &self.source_cluster_secret_key,
            &self.source_cluster_endpoint,
        )
    }

    /// Endpoint of the target side
    pub fn target_endpoint(&self) -> StorageEndpointConfig {
        StorageEndpointConfig::new(
            &self.target_cluster_access_key,
            &self.target_cluster_secret_key,
            &self.target_cluster_endpoint,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL: &str = r#"
source_cluster_access_key = "src-ak"
source_cluster_secret_key = "src-sk"
source_cluster_endpoint = "http://10.0.0.1:7480"
target_cluster_access_key = "dst-ak"
target_cluster_secret_key = "dst-sk"
target_cluster_endpoint = "http://10.0.0.2:7480"
"#;

    #[test]
    fn test_parse_full_properties() {
        let props = SyncProperties::parse(FULL).unwrap();
        assert_eq!(props.source_endpoint().endpoint, "http://10.0.0.1:7480");
        assert_eq!(props.target_endpoint().access_key_id, "dst-ak");
        assert_eq!(props.target_endpoint().secret_key, "dst-sk");
    }

    #[test]
    fn test_source_keys_are_optional() {
        let props = SyncProperties::parse(
            r#"
target_cluster_access_key = "a"
target_cluster_secret_key = "b"
target_cluster_endpoint = "http://c"
"#,
        )
        .unwrap();
        assert_eq!(props.source_endpoint().endpoint, "");
    }

    #[test]
    fn test_missing_target_key_is_config_error() {
        let err = SyncProperties::parse(r#"target_cluster_access_key = "a""#).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = SyncProperties::parse(
            r#"
target_cluster_access_key = "a"
target_cluster_secret_key = ""
target_cluster_endpoint = "http://c"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("target_cluster_secret_key"));
    }

    #[test]
    fn test_unquoted_values_are_rejected_with_hint() {
        let err = SyncProperties::parse(
            "target_cluster_access_key=a\ntarget_cluster_secret_key=b\ntarget_cluster_endpoint=http://c\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("quoted"));
    }

    #[test]
    fn test_default_path_is_toml() {
        if let Ok(path) = SyncProperties::default_path() {
            assert!(path.ends_with("bucketsync/sync.toml"));
        }
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sync.toml");
        std::fs::write(&path, FULL).unwrap();

        let props = SyncProperties::load(Some(&path)).unwrap();
        assert_eq!(props.source_endpoint().access_key_id, "src-ak");

        let missing = tmp.path().join("nope.properties");
        assert!(matches!(
            SyncProperties::load(Some(&missing)),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let props = SyncProperties::parse(FULL).unwrap();
        let shown = format!("{:?}", props);
        assert!(!shown.contains("src-sk"));
        assert!(!shown.contains("dst-sk"));
    }
}
