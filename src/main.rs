use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ublox_reader::{Config, UbloxReader};

#[derive(Parser)]
#[command(version, about = "Read Galileo navigation data from a u-blox receiver")]
struct Args {
    /// YAML configuration file; defaults apply when omitted
    #[arg(short, long, env = "UBLOX_READER_CONFIG")]
    config: Option<PathBuf>,

    /// Process a capture file instead of the serial port
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Override the serial port from the configuration
    #[arg(short, long)]
    port: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ublox_reader=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.serial.port = port;
    }

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    let stats = match &args.replay {
        Some(path) => UbloxReader::replay(path, &config, cancel)
            .await
            .with_context(|| format!("Replay of {} failed", path.display()))?,
        None => UbloxReader::run(&config, cancel)
            .await
            .with_context(|| format!("Reading {} failed", config.serial.port))?,
    };

    info!(
        frames = stats.frames,
        records = stats.records_stored,
        store_failures = stats.store_failures,
        attacks = stats.attacks_flagged,
        validation_samples = stats.validation_samples,
        "Finished"
    );
    Ok(())
}

/// Cancel on SIGINT, and on SIGTERM, SIGHUP or SIGQUIT where available.
async fn watch_signals(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let kinds = [SignalKind::terminate(), SignalKind::hangup(), SignalKind::quit()];
        let mut streams = Vec::new();
        for kind in kinds {
            match signal(kind) {
                Ok(stream) => streams.push(stream),
                Err(e) => warn!("Cannot listen for {:?}: {}", kind, e),
            }
        }
        let unix_signal = async {
            if streams.is_empty() {
                std::future::pending::<()>().await;
            }
            futures::future::select_all(streams.iter_mut().map(|s| Box::pin(s.recv()))).await;
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = unix_signal => info!("Received termination signal"),
        }
    }

    #[cfg(not(unix))]
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C");
    }

    info!("Shutting down, draining in-flight frames");
    cancel.cancel();
}
