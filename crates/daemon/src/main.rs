//! Hookbridge - Main Entry Point
//!
//! Composition root: wires config, broker, dispatch and the JSON-RPC server.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use hookbridge_api_rpc::{RpcServer, RpcServerConfig};
use hookbridge_core::application::worker::shutdown_channel;
use hookbridge_core::application::{
    AdjustableSemaphore, ConsumerRegistry, DispatchConfig, DispatchService, Reconciler,
};
use hookbridge_core::domain::DispatchGroups;
use hookbridge_core::port::{LogOutcomeStore, SystemTimeProvider, UuidProvider};
use hookbridge_infra_broker::InMemoryBroker;
use hookbridge_infra_config::FileConfigService;
use hookbridge_infra_http::HttpWebhookTransport;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_CONFIG_PATH: &str = "hookbridge.json";
const DEFAULT_RPC_PORT: u16 = 9620;
const DEFAULT_MAX_IN_FLIGHT: usize = 64;
const DEFAULT_CALLBACK_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CONFIG_POLL_MS: u64 = 10_000;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format =
        std::env::var("HOOKBRIDGE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("hookbridge=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Hookbridge v{} starting...", VERSION);

    // 2. Load configuration from environment
    let config_path = std::env::var("HOOKBRIDGE_CONFIG_PATH")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let rpc_port: u16 = env_parse("HOOKBRIDGE_RPC_PORT", DEFAULT_RPC_PORT);
    let max_in_flight: usize = env_parse("HOOKBRIDGE_MAX_IN_FLIGHT", DEFAULT_MAX_IN_FLIGHT);
    let callback_timeout_ms: u64 =
        env_parse("HOOKBRIDGE_CALLBACK_TIMEOUT_MS", DEFAULT_CALLBACK_TIMEOUT_MS);
    let config_poll_ms: u64 = env_parse("HOOKBRIDGE_CONFIG_POLL_MS", DEFAULT_CONFIG_POLL_MS);

    // 0 means wait for a permit without limit
    let acquire_timeout_ms: u64 = env_parse("HOOKBRIDGE_ACQUIRE_TIMEOUT_MS", 0);
    let acquire_timeout = match acquire_timeout_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };

    let groups = DispatchGroups::parse(
        &std::env::var("HOOKBRIDGE_DISPATCH_GROUPS").unwrap_or_default(),
    );

    info!(config_path = %config_path, "Loading subscription config...");

    // 3. Setup dependencies (DI wiring)
    let config_service = FileConfigService::load(&config_path)
        .await
        .map_err(|e| anyhow::anyhow!("Config load failed: {}", e))?;
    let config_watcher = config_service.spawn_watcher(Duration::from_millis(config_poll_ms));

    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let broker = InMemoryBroker::new();
    let transport = Arc::new(HttpWebhookTransport::new(Duration::from_millis(
        callback_timeout_ms,
    )));
    let outcomes = Arc::new(LogOutcomeStore);

    let semaphore = Arc::new(AdjustableSemaphore::new(max_in_flight));
    let dispatcher = Arc::new(DispatchService::new(
        config_service.clone(),
        transport,
        outcomes,
        semaphore.clone(),
        time_provider.clone(),
        DispatchConfig { acquire_timeout },
    ));

    let registry = Arc::new(ConsumerRegistry::new(broker.clone(), dispatcher));

    // 4. Start the reconciler (initial pass + reacts to config changes)
    info!("Starting consumer reconciler...");
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let reconciler = Arc::new(Reconciler::new(
        config_service.clone(),
        registry.clone(),
        groups,
    ));
    let reconciler_handle = tokio::spawn(reconciler.clone().run(shutdown_rx));

    // 5. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let rpc_server = RpcServer::new(
        rpc_config,
        broker,
        registry.clone(),
        reconciler,
        semaphore,
        id_provider,
        time_provider,
    );
    let rpc_handle = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!("System ready. Dispatching callbacks...");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    shutdown_tx.shutdown();
    config_watcher.abort();
    registry.stop_all().await;
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let _ = tokio::time::timeout(Duration::from_secs(5), reconciler_handle).await;

    info!("Shutdown complete.");

    Ok(())
}
