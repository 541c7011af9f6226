//! vdlaunch - set up a virtual device instance and hold it until interrupted.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use vdlaunch::pipeline::ExecutionMode;
use vdlaunch::{FetchManifest, LaunchConfig, Launcher, init_logging_for};

/// Host-side virtual device launcher.
#[derive(Parser, Debug)]
#[command(name = "vdlaunch", version, about)]
struct Args {
    /// Launch configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Build-artifact manifest (JSON).
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Instance name, used when no config file is given.
    #[arg(long, default_value = "cvd-1")]
    instance: String,

    /// Run independent features concurrently, at most this many at once.
    #[arg(long)]
    parallel: Option<usize>,

    /// Resolve and print the setup order without running anything.
    #[arg(long)]
    dry_run: bool,
}

fn load_config(args: &Args) -> anyhow::Result<LaunchConfig> {
    let mut config = match &args.config {
        Some(path) => LaunchConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let home = dirs::home_dir()
                .context("cannot determine home directory")?
                .join(".vdlaunch")
                .join(&args.instance);
            LaunchConfig::new(&args.instance, home)
        }
    };

    if let Some(max_parallel) = args.parallel {
        config.execution = ExecutionMode::parallel(max_parallel);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let manifest = match &args.manifest {
        Some(path) => FetchManifest::load(path)
            .with_context(|| format!("loading manifest {}", path.display()))?,
        None => FetchManifest::default(),
    };

    let launcher = Launcher::new(config, manifest)?;
    init_logging_for(&launcher.layout())?;

    if args.dry_run {
        let plan = launcher.plan()?;
        for name in plan.order_names() {
            println!("{}", name);
        }
        for name in plan.skipped() {
            println!("{} (disabled)", name);
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            ctrl_c.cancel();
        }
    });

    let session = launcher.launch(&cancel).await?;
    tracing::info!(
        attempt = %session.attempt_id(),
        features = ?session.commit_log().names(),
        duration_ms = session.metrics().total_duration_ms,
        "Instance ready"
    );

    cancel.cancelled().await;

    let report = session.shutdown().await;
    if !report.is_clean() {
        anyhow::bail!(
            "{} feature(s) failed to tear down cleanly",
            report.failures.len()
        );
    }
    Ok(())
}
