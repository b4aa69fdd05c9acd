mod metrics;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use transmute_core::config::{LogFormat, LoggingConfig};
use transmute_core::converter::ConverterRegistry;
use transmute_core::job::{JobStore, SqliteJobStore};
use transmute_core::queue::create_queue;
use transmute_core::storage::create_storage;
use transmute_core::worker::Worker;
use transmute_core::{load_config, validate_config, SanitizedConfig};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging may not be initialised yet.
        eprintln!("Fatal error: {:#}", e);
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.level.clone().into());

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("TRANSMUTE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(&config.logging);

    // Compute config hash so restarts with changed settings are visible
    let config_json = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "transmute-worker {} starting (config {:?}, hash {})",
        VERSION,
        config_path,
        &config_hash[..16]
    );
    debug!("Effective configuration: {}", config_json);

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }
    }

    // Create SQLite job store
    let store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized at {:?}", config.database.path);

    // Create queue
    let queue = create_queue(&config.queue, &config.database.path)
        .context("Failed to create job queue")?;
    info!("Using {} queue", queue.name());

    // Create storage backend
    let storage = create_storage(&config.storage).context("Failed to create storage backend")?;
    info!("Using {} storage", storage.name());

    // Create converters and check their tools
    let registry = Arc::new(ConverterRegistry::with_tools(&config.converters));
    for converter in registry.converters() {
        match converter.validate().await {
            Ok(()) => info!(
                "Converter {} ready for {}",
                converter.name(),
                converter.category()
            ),
            Err(e) => warn!(
                "Converter {} unavailable, {} jobs will fail: {}",
                converter.name(),
                converter.category(),
                e
            ),
        }
    }

    // Touch the registry so all collectors are registered before work starts
    once_cell::sync::Lazy::force(&metrics::REGISTRY);

    let worker = Worker::new(queue, store, storage, registry, config.worker.clone());
    worker.start().await;

    shutdown_signal().await;

    info!("Shutting down...");
    worker.stop().await;

    let status = worker.status().await;
    info!(
        "Worker stopped: {} completed, {} failed, {} recovered",
        status.total_completed, status.total_failed, status.total_recovered
    );
    debug!("Final metrics:\n{}", metrics::render());

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
