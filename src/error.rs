//! Error types for bucketsync

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bucketsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bucketsync
///
/// Variants split into job-level failures, which stop a sync run before or
/// between pages, and object-level failures, which only cost one object.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing configuration; the sync never starts
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Client construction or backend probe failed
    #[error("Backend unavailable ({backend}): {message}")]
    BackendUnavailable {
        backend: &'static str,
        message: String,
    },

    /// Listing a container failed
    #[error("List error in {container}: {message}")]
    List { container: String, message: String },

    /// Provisioning the destination bucket failed
    #[error("Create bucket error for {bucket}: {message}")]
    Create { bucket: String, message: String },

    /// A locator could not be produced for one object
    #[error("Resolve error for {object}: {message}")]
    Resolve { object: String, message: String },

    /// Fetching or uploading one object failed
    #[error("Transfer error for {object}: {message}")]
    Transfer { object: String, message: String },

    /// Local I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Local file does not exist
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            message: message.into(),
        }
    }

    pub fn list(container: impl Into<String>, message: impl Into<String>) -> Self {
        Self::List {
            container: container.into(),
            message: message.into(),
        }
    }

    pub fn create(bucket: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Create {
            bucket: bucket.into(),
            message: message.into(),
        }
    }

    pub fn resolve(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            object: object.into(),
            message: message.into(),
        }
    }

    pub fn transfer(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transfer {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Check if this error aborts the whole sync job
    ///
    /// Resolve and transfer failures are confined to a single object and are
    /// absorbed at the task boundary.
    pub fn is_job_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Resolve { .. } | Error::Transfer { .. } | Error::NotFound { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: format!(
                "properties parse error (expected TOML with quoted string values): {}",
                err
            ),
        }
    }
}
