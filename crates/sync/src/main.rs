//! versync daemon binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use versync::{
    BatchRunner, FileCheckpoint, Forwarder, PUSH_CHECKPOINT, Poller, Pusher, REPLICATE_CHECKPOINT,
    Replicator, Submitter, VerificationApi, VerifierClient,
};
use versync_core::config::AppConfig;
use versync_store::ContractStore;

/// versync - keeps verified contract stores in sync
#[derive(Parser, Debug)]
#[command(name = "versyncd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "VERSYNC_CONFIG",
        default_value = "config/versync.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy verified contracts from the source store into the target store
    Replicate,
    /// Submit verified contracts from the source store to the verification API
    Push {
        /// Resubmit failed rows that still have attempts left before the scan
        #[arg(long)]
        resubmit_failed: bool,
    },
    /// Poll every submitted verification job once
    Reconcile,
    /// Forward newly verified contracts as they are inserted
    Forward,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = versync::config::load(Path::new(&args.config))?;
    versync::telemetry::init(&config.log);

    tracing::info!("versync v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(config_path = %args.config, command = ?args.command, "Configuration loaded");

    let shutdown = CancellationToken::new();
    versync::shutdown::spawn_signal_handler(shutdown.clone());

    let source = open_store(&config.source, "source").await?;
    let result = run(args.command, &config, source.clone(), shutdown).await;
    source.close().await;

    if let Err(e) = &result {
        tracing::error!("Run failed: {e:#}");
    }
    result
}

async fn open_store(
    config: &versync_core::config::DatabaseConfig,
    role: &str,
) -> Result<Arc<dyn ContractStore>> {
    let store = versync_store::from_config(config)
        .await
        .with_context(|| format!("failed to initialize {role} store"))?;
    store
        .health_check()
        .await
        .with_context(|| format!("{role} store health check failed"))?;
    tracing::info!(role, "Store connectivity verified");
    Ok(store)
}

fn verifier(config: &AppConfig) -> Result<Arc<dyn VerificationApi>> {
    let client = VerifierClient::new(&config.verifier).context("failed to build verifier client")?;
    tracing::info!(base_url = %client.base_url(), "Verification API configured");
    Ok(Arc::new(client))
}

async fn run(
    command: Command,
    config: &AppConfig,
    source: Arc<dyn ContractStore>,
    shutdown: CancellationToken,
) -> Result<()> {
    match command {
        Command::Replicate => {
            let target_config = config
                .target
                .as_ref()
                .context("replicate requires a [target] store")?;
            let target = open_store(target_config, "target").await?;

            let runner = BatchRunner::new(
                Replicator::new(source, target.clone(), config.replicate.created_by.clone()),
                Arc::new(FileCheckpoint::in_dir(
                    &config.checkpoint.dir,
                    REPLICATE_CHECKPOINT,
                )),
                config.replicate.clone(),
                shutdown,
            );
            let result = runner.run().await;
            target.close().await;
            result.context("replication failed")?;
        }
        Command::Push { resubmit_failed } => {
            let submitter = Submitter::new(source, verifier(config)?, config.verifier.retry.clone());
            let runner = BatchRunner::new(
                Pusher::new(submitter, config.push.clone()),
                Arc::new(FileCheckpoint::in_dir(&config.checkpoint.dir, PUSH_CHECKPOINT)),
                config.push.clone(),
                shutdown.clone(),
            );

            if resubmit_failed {
                runner
                    .pipeline()
                    .resubmit_failed(&shutdown)
                    .await
                    .context("resubmission failed")?;
            }
            runner.run().await.context("push failed")?;
            if !shutdown.is_cancelled() {
                runner
                    .pipeline()
                    .poller()
                    .run_pass(&shutdown)
                    .await
                    .context("reconciliation failed")?;
            }
        }
        Command::Reconcile => {
            let poller = Poller::new(
                source,
                verifier(config)?,
                config.push.batch_size,
                config.push.item_delay(),
            );
            poller
                .run_pass(&shutdown)
                .await
                .context("reconciliation failed")?;
        }
        Command::Forward => {
            let submitter = Submitter::new(source, verifier(config)?, config.verifier.retry.clone());
            Forwarder::new(submitter, config.forward.clone())
                .run(shutdown)
                .await
                .context("forwarder stopped")?;
        }
    }
    Ok(())
}
