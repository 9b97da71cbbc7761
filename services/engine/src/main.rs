//! fleet engine
//!
//! Runs the reconciliation engine on a single node against an in-process
//! registry. The node registers itself as a machine, takes the leader
//! lease, and reconciles until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fleet_engine::{
    config::{self, LogFormat},
    join_engine, Engine,
};
use fleet_registry::{LocalMachine, MemoryRegistry, StaticMachine};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to FLEET_LOG_LEVEL)
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into());
    let subscriber = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
    }

    info!("Starting fleet engine");
    info!(machine = %config.machine_id, "Configuration loaded");

    let registry = MemoryRegistry::new();
    let machine = StaticMachine::new(config.machine_state());
    registry.add_machine(machine.state()).await;

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut engine = Engine::new(Arc::new(registry), Arc::new(machine));
    let engine_handle = tokio::spawn(async move {
        engine.run(shutdown_rx).await;
        engine.purge().await;
    });

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);

    // The engine finishes any pass in flight before it stops.
    let shutdown_timeout = Duration::from_secs(10);
    join_engine(engine_handle, shutdown_timeout).await;

    info!("Engine shutdown complete");
    Ok(())
}
