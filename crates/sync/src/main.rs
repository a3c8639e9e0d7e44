mod metrics;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridsync_core::{
    load_config, run_number, run_range, validate_config, CommandRunner, Config, DirectoryLister,
    KnownGoodList, LfcDirectoryLister, ProcessRunner, SyncDriver, SyncFilter, SyncReport,
};

/// Pattern argument selecting the known-good list instead of a substring.
const KNOWN_GOOD_PATTERN: &str = "GOODFILES";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(directory), Some(destination)) = (args.next(), args.next()) else {
        bail!("usage: gridsync <lfn-directory> <destination-se> [pattern|GOODFILES]");
    };
    let pattern = args.next();

    // Determine config path
    let config_path = std::env::var("GRIDSYNC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("gridsync.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        fts = %config.transfer.fts_service,
        mode = ?config.sync.mode,
        storage_elements = config.storage_elements.len(),
        "Configuration loaded successfully"
    );

    let outcome = sync(&config, &directory, &destination, pattern.as_deref()).await;

    if let Some(path) = &config.metrics.textfile {
        metrics::record_run(outcome.is_ok());
        if let Err(e) = metrics::write_textfile(path) {
            warn!("Failed to write metrics to {:?}: {}", path, e);
        }
    }

    let report = outcome?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// One pass over `directory` towards `destination`.
async fn sync(
    config: &Config,
    directory: &str,
    destination: &str,
    pattern: Option<&str>,
) -> Result<SyncReport> {
    let registry = Arc::new(config.registry().context("Invalid storage elements")?);
    if !registry.contains(destination) {
        bail!("Unknown destination storage element {}", destination);
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(config.commands.clone()));
    let lister = LfcDirectoryLister::new(
        runner.clone(),
        config.sync.namespace_root.clone(),
        config.transfer.vo.clone(),
    );
    let snapshot = lister
        .snapshot(directory)
        .await
        .with_context(|| format!("Failed to list {}", directory))?;

    let filter = match pattern {
        Some(KNOWN_GOOD_PATTERN) => {
            let path = config
                .sync
                .known_good_list
                .as_deref()
                .context("GOODFILES requested but sync.known_good_list is not set")?;
            let run = snapshot
                .entries()
                .first()
                .and_then(|entry| run_number(&entry.name));
            match run {
                Some(run) => KnownGoodList::load(path, &run_range(run))
                    .await
                    .context("Failed to load known-good list")?
                    .into_filter(),
                None => {
                    warn!(directory, "No run number in directory, known-good list not applied");
                    SyncFilter::All
                }
            }
        }
        other => SyncFilter::from_pattern(other),
    };

    let driver = SyncDriver::from_parts(
        runner,
        registry,
        config.transfer.clone(),
        config.quota.clone(),
        config.sync.clone(),
    );
    let report = driver
        .sync_directory(&snapshot, destination, &filter)
        .await
        .with_context(|| format!("Sync of {} to {} failed", directory, destination))?;

    info!(
        directory,
        destination,
        queued = report.queued,
        transfers = report.transfer_ids().len(),
        "Sync finished"
    );
    Ok(report)
}
