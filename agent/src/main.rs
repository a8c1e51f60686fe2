mod agent;
mod bootstrap;
mod config;
mod errors;
mod hub;
mod identity;
mod interval;
mod methods;
mod metrics;
mod model;
mod telemetry;

use clap::Parser;
use config::Cli;
use hub::mqtt::{HubOptions, MqttHub};
use identity::{FixedIdentity, IdentityProvider, MacAddressIdentity};
use interval::SharedInterval;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    info!("IoT Hub device sending periodic messages, press Ctrl-C to exit");
    info!(
        "Hub: {}:{}, device: {}, default interval: {}s",
        cli.connection_string.host_name,
        cli.port,
        cli.connection_string.device_id,
        cli.telemetry_interval
    );

    metrics::init_metrics()?;

    if let Some(addr) = &cli.metrics_addr {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to bind to {}: {}", addr, e);
                std::process::exit(1);
            });
        info!("Metrics server listening on {}", addr);

        tokio::spawn(async move {
            axum::serve(listener, metrics::router())
                .await
                .unwrap_or_else(|e| {
                    error!("Metrics server error: {}", e);
                });
        });
    }

    let identity: Box<dyn IdentityProvider> = match &cli.node_id {
        Some(id) => Box::new(FixedIdentity::new(id)),
        None => Box::new(MacAddressIdentity),
    };
    let interval = SharedInterval::new(cli.telemetry_interval);

    let hub = MqttHub::connect(HubOptions {
        connection: cli.connection_string,
        port: cli.port,
        tls: !cli.no_tls,
        keep_alive: Duration::from_secs(cli.keep_alive_secs),
        sas_ttl: Duration::from_secs(cli.sas_ttl_secs),
    })
    .await?;

    agent::run(Arc::new(hub), identity.as_ref(), interval, shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
