//! Harvest Binary Entry Point
//!
//! Runs the collection heartbeat against a headless in-memory host, or
//! lists the collectors held by the configured backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use harvest::{
    AppConfig, CollectionEngine, CollectorRegistry, ConfigHandle, MemoryWorld, StorageBuilder,
    config::{DatabaseDriver, parse_duration},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Harvest - Automated Resource Collection
#[derive(Parser, Debug)]
#[command(name = "harvest", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "HARVEST_CONFIG"
    )]
    config: String,

    /// Storage backend (overrides config file)
    #[arg(long, env = "HARVEST_DB_DRIVER")]
    db_driver: Option<DatabaseDriver>,

    /// SQLite database file (overrides config file)
    #[arg(long, env = "HARVEST_SQLITE_FILE")]
    sqlite_file: Option<String>,

    /// Heartbeat period such as `50ms` (overrides config file)
    #[arg(long, env = "HARVEST_TICK_INTERVAL", value_parser = parse_duration)]
    tick_interval: Option<Duration>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the collection heartbeat until Ctrl+C
    Run {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Print stored collectors
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harvest=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration from file
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(driver) = cli.db_driver {
        config.database.driver = driver;
    }
    if let Some(file) = cli.sqlite_file {
        config.database.sqlite.file = file;
    }
    if let Some(period) = cli.tick_interval {
        config.collection.tick_interval = period;
    }
    config.validate()?;

    tracing::info!(
        driver = %config.database.driver,
        interval_ticks = config.collection.interval_ticks,
        tick_interval = ?config.collection.tick_interval,
        "Configuration loaded"
    );

    let store = StorageBuilder::new(config.database.clone()).build()?;
    let world = Arc::new(MemoryWorld::new(config.worlds.clone()));
    let handle = ConfigHandle::new(config, Some(cli.config.into()));

    match cli.command {
        Command::Run { ticks } => {
            let registry =
                Arc::new(CollectorRegistry::open(store, world, handle.subscribe()).await);
            if !registry.is_persistent() {
                tracing::warn!("Running without persistence");
            }

            let mut engine = CollectionEngine::new(registry.clone());
            tracing::info!("Press Ctrl+C to shutdown");
            engine.run(ticks, shutdown_signal()).await;

            tracing::info!("Shutting down collector registry...");
            registry.shutdown().await;
        }
        Command::List { json } => {
            store.initialize().await?;
            let records = store.load_all(&*world).await;
            store.close().await;

            let records: BTreeMap<String, _> = records?
                .into_iter()
                .map(|(id, record)| (id.to_string(), record))
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No collectors found.");
            } else {
                println!("Collectors ({}):", records.len());
                for (id, record) in &records {
                    let a = record.anchor();
                    println!(
                        "{} - {} {},{},{} (speed {}, range {}, chests {}/{})",
                        id,
                        a.world,
                        a.x,
                        a.y,
                        a.z,
                        record.speed_level(),
                        record.range_level(),
                        record.linked_containers().len(),
                        record.max_linked_containers()
                    );
                }
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
