//! bucketsync - mirror object collections across storage backends
//!
//! This library copies every object of a source bucket (an S3-compatible
//! service, Aliyun OSS, or a local directory tree) into a target bucket,
//! one listing page at a time with the objects of each page transferred
//! concurrently.

pub mod cli;
pub mod config;
pub mod error;
pub mod storage;
pub mod sync;
pub mod types;

pub use config::SyncProperties;
pub use error::{Error, Result};
pub use types::*;
