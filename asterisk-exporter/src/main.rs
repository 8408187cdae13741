//! Prometheus exporter for Asterisk.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{error, info};

use asterisk_exporter::{ExporterConfig, HttpServer, build_registry};

/// Prometheus exporter for Asterisk.
#[derive(Parser, Debug)]
#[command(name = "asterisk-exporter")]
#[command(about = "Export Asterisk SIP state as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    asterisk_common::init_tracing(&config.logging)?;

    info!("Starting Asterisk Prometheus Exporter");

    let registry = Arc::new(build_registry(&config, Handle::current())?);
    info!(
        collectors = ?registry.collector_names(),
        binary = %config.asterisk.binary,
        "Collectors registered"
    );

    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        registry.clone(),
        listen_addr,
        config.prometheus.path.clone(),
    );
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = registry.stats();
    info!(
        scrapes_total = stats.scrapes_total,
        failed_collections_total = stats.failed_collections_total,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
