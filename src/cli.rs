//! CLI argument parsing for bucketsync

use crate::types::{SourceKind, SyncJobSpec};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// bucketsync - mirror a bucket or directory tree onto an object store
#[derive(Parser, Debug)]
#[command(name = "bucketsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Enable debug logging (same as -v)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective verbosity level, folding `--debug` into `-v`
    pub fn verbosity(&self) -> u8 {
        self.verbose.max(u8::from(self.debug))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync one bucket or local directory to the target bucket
    Bucket(BucketArgs),

    /// Sync every bucket of the source cluster to same-named target buckets
    Cluster(ClusterArgs),
}

/// Options shared by every sync command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// TOML properties file with source/target credentials and endpoints;
    /// values are quoted, e.g. `target_cluster_endpoint = "http://rgw:7480"`
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Source backend: ceph, oss or local
    #[arg(long = "source-type", default_value = "ceph", value_parser = parse_source_kind)]
    pub source_type: SourceKind,

    /// Only sync source objects whose name starts with this prefix
    #[arg(long, default_value = "")]
    pub source_prefix: String,

    /// Prepended to every object name on the target
    #[arg(long, default_value = "")]
    pub target_prefix: String,
}

/// Arguments for the bucket command
#[derive(Args, Debug)]
pub struct BucketArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Source bucket name
    #[arg(long)]
    pub source_bucket: Option<String>,

    /// Source directory (local source type), used when no source bucket is given
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Target bucket name
    #[arg(long)]
    pub target_bucket: String,
}

impl BucketArgs {
    /// Convert CLI args into a job description
    pub fn to_job_spec(&self) -> SyncJobSpec {
        SyncJobSpec {
            source_kind: self.common.source_type,
            source_bucket: self.source_bucket.clone(),
            source_dir: self.source_dir.clone(),
            source_prefix: self.common.source_prefix.clone(),
            target_bucket: self.target_bucket.clone(),
            target_prefix: self.common.target_prefix.clone(),
        }
    }
}

/// Arguments for the cluster command
#[derive(Args, Debug)]
pub struct ClusterArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl ClusterArgs {
    /// Job template applied to every bucket; bucket names are filled in per bucket
    pub fn to_job_template(&self) -> SyncJobSpec {
        SyncJobSpec {
            source_kind: self.common.source_type,
            source_bucket: None,
            source_dir: None,
            source_prefix: self.common.source_prefix.clone(),
            target_bucket: String::new(),
            target_prefix: self.common.target_prefix.clone(),
        }
    }
}

fn parse_source_kind(s: &str) -> std::result::Result<SourceKind, String> {
    SourceKind::parse(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_command() {
        let cli = Cli::try_parse_from([
            "bucketsync",
            "bucket",
            "--config",
            "/etc/bucketsync/sync.toml",
            "--source-type",
            "LOCAL",
            "--source-dir",
            "/data",
            "--target-bucket",
            "mirror",
            "--target-prefix",
            "backup/",
        ])
        .unwrap();

        let Commands::Bucket(args) = cli.command else {
            panic!("expected bucket command");
        };
        let job = args.to_job_spec();
        assert_eq!(job.source_kind, SourceKind::Local);
        assert_eq!(job.source_container().as_deref(), Some("/data"));
        assert_eq!(job.target_prefix, "backup/");
        assert_eq!(job.source_prefix, "");
        assert_eq!(args.common.config, Some(PathBuf::from("/etc/bucketsync/sync.toml")));
    }

    #[test]
    fn test_source_type_defaults_to_ceph() {
        let cli = Cli::try_parse_from([
            "bucketsync",
            "bucket",
            "--source-bucket",
            "photos",
            "--target-bucket",
            "mirror",
        ])
        .unwrap();
        let Commands::Bucket(args) = cli.command else {
            panic!("expected bucket command");
        };
        assert_eq!(args.common.source_type, SourceKind::Ceph);
    }

    #[test]
    fn test_unknown_source_type_is_rejected() {
        let result = Cli::try_parse_from([
            "bucketsync",
            "bucket",
            "--source-type",
            "ftp",
            "--target-bucket",
            "mirror",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_flag_raises_verbosity() {
        let cli = Cli::try_parse_from(["bucketsync", "--debug", "cluster"]).unwrap();
        assert_eq!(cli.verbosity(), 1);

        let cli = Cli::try_parse_from(["bucketsync", "-vv", "cluster"]).unwrap();
        assert_eq!(cli.verbosity(), 2);
    }

    #[test]
    fn test_cluster_template() {
        let cli = Cli::try_parse_from([
            "bucketsync",
            "cluster",
            "--source-type",
            "oss",
            "--target-prefix",
            "dr/",
        ])
        .unwrap();
        let Commands::Cluster(args) = cli.command else {
            panic!("expected cluster command");
        };
        let template = args.to_job_template();
        assert_eq!(template.source_kind, SourceKind::Oss);
        assert_eq!(template.target_prefix, "dr/");
        assert!(template.source_bucket.is_none());
    }
}
