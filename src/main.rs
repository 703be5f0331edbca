//! bucketsync - mirror object collections across storage backends

use anyhow::Context;
use bucketsync::cli::{Cli, Commands, CommonArgs};
use bucketsync::config::SyncProperties;
use bucketsync::storage::{create_source_store, create_target_store};
use bucketsync::sync::SyncEngine;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbosity(), cli.json);

    // Ctrl+C is the only way to stop a run; in-flight transfers are abandoned
    setup_interrupt_handler();

    if let Err(e) = run(&cli).await {
        tracing::error!(error = %format!("{:#}", e), "Sync aborted");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Bucket(args) => {
            let engine = build_engine(&args.common)?;
            let job = args.to_job_spec();
            tracing::info!(
                source_type = %job.source_kind,
                target_bucket = %job.target_bucket,
                "Begin sync data from source bucket"
            );

            let stats = engine.sync_bucket(&job).await?;
            tracing::info!(
                transferred = stats.objects_transferred,
                errors = stats.errors,
                "Finished sync data from source bucket"
            );
        }

        Commands::Cluster(args) => {
            let engine = build_engine(&args.common)?;
            let summary = engine.sync_cluster(&args.to_job_template()).await?;
            tracing::info!(
                transferred = summary.stats.objects_transferred,
                errors = summary.stats.errors,
                failed_buckets = summary.failed_buckets.len(),
                "Finished cluster sync"
            );
            if !summary.failed_buckets.is_empty() {
                anyhow::bail!(
                    "sync aborted for buckets: {}",
                    summary.failed_buckets.join(", ")
                );
            }
        }
    }

    Ok(())
}

fn build_engine(args: &CommonArgs) -> anyhow::Result<SyncEngine> {
    let props = SyncProperties::load(args.config.as_deref())?;
    let source = create_source_store(args.source_type, &props.source_endpoint())
        .context("create source store client failed")?;
    let target = create_target_store(&props.target_endpoint())
        .context("create target store client failed")?;
    Ok(SyncEngine::new(source, target))
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("bucketsync=info"),
        1 => EnvFilter::new("bucketsync=debug"),
        2 => EnvFilter::new("bucketsync=trace"),
        _ => EnvFilter::new("trace"),
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

fn setup_interrupt_handler() {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, target left partially synced");
            std::process::exit(130);
        }
    });
}
