//! forge-worker
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────┐
//!                    │                   FORGE WORKER                    │
//!                    │                                                   │
//!   HTTP request     │  ┌──────────┐   ┌──────────────┐   ┌──────────┐   │
//!   ─────────────────┼─▶│  http    │──▶│   context    │──▶│  health  │   │
//!                    │  │  server  │   │  middleware  │   │ handler  │   │
//!                    │  └──────────┘   └──────┬───────┘   └────┬─────┘   │
//!                    │                        │                │         │
//!                    │                        ▼                ▼         │
//!                    │  ┌─────────────────────────────────────────────┐  │
//!                    │  │ services: database │ storage │ queue        │──┼──▶ backends
//!                    │  └─────────────────────────────────────────────┘  │
//!                    │                        ▲                          │
//!                    │  ┌──────────┐   ┌──────┴───────┐                  │
//!   queue batches ───┼─▶│ consumer │──▶│   handlers   │                  │
//!                    │  │  worker  │   │ (by type)    │                  │
//!                    │  └──────────┘   └──────────────┘                  │
//!                    └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use forge_worker::config::{load_config, WorkerConfig};
use forge_worker::consumer::{ConsumerWorker, HandlerRegistry, QueueConsumer};
use forge_worker::lifecycle::{bind_listener, build_bindings, signals, Shutdown, StartupError};
use forge_worker::observability::{init_logging, metrics};
use forge_worker::HttpServer;

#[derive(Parser)]
#[command(name = "forge-worker", version, about = "Project-lifecycle worker")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => WorkerConfig::default(),
    };
    init_logging(&config.logging).map_err(|e| StartupError::Logging(e.to_string()))?;

    tracing::info!(
        version = %config.service.version,
        environment = %config.service.environment,
        config = ?args.config,
        "forge-worker starting"
    );
    log_config(&config);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bindings = Arc::new(build_bindings(&config).await?);
    let listener = bind_listener(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();

    let consumer = if config.consumer.enabled {
        let worker = ConsumerWorker::new(
            Arc::clone(&bindings),
            QueueConsumer::from_config(HandlerRegistry::new(), &config),
            &config.consumer,
        );
        Some(tokio::spawn(worker.run(shutdown.subscribe())))
    } else {
        tracing::info!("Queue consumer disabled");
        None
    };

    let server = HttpServer::new(&config.listener, Arc::clone(&bindings));
    let server = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::shutdown_on_signal(&shutdown).await;

    server.await??;
    if let Some(consumer) = consumer {
        consumer.await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn log_config(config: &WorkerConfig) {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        database = %config.database.url,
        storage_driver = ?config.storage.driver,
        queue = %config.queue.name,
        consumer_enabled = config.consumer.enabled,
        "Configuration loaded"
    );
}
