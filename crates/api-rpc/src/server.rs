//! JSON-RPC Server
//!
//! Implements the JSON-RPC 2.0 server over TCP on localhost.

use crate::facade;
use crate::handler::RpcHandler;
use crate::types::{
    ConsumersRequest, PublishRequest, ReloadRequest, SetConcurrencyRequest, StatsRequest,
};
use hookbridge_core::application::{AdjustableSemaphore, ConsumerRegistry, Reconciler};
use hookbridge_core::port::{IdProvider, MessagePublisher, TimeProvider};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9620;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RpcServerConfig,
        publisher: Arc<dyn MessagePublisher>,
        registry: Arc<ConsumerRegistry>,
        reconciler: Arc<Reconciler>,
        semaphore: Arc<AdjustableSemaphore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(
                publisher,
                registry,
                reconciler,
                semaphore,
                id_provider,
                time_provider,
            )),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Security: Only binds to 127.0.0.1 (no external access)
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let mut module = RpcModule::new(());

        // Register methods
        let handler = self.handler.clone();
        module
            .register_async_method("bridge.publish.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: PublishRequest = params.parse()?;
                    facade::call("bridge.publish.v1", req, |req| async move {
                        handler.publish(req).await
                    })
                    .await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("bridge.consumers.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ConsumersRequest = params.parse()?;
                    facade::call("bridge.consumers.v1", req, |req| async move {
                        handler.consumers(req).await
                    })
                    .await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("bridge.reload.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ReloadRequest = params.parse()?;
                    facade::call("bridge.reload.v1", req, |req| async move {
                        handler.reload(req).await
                    })
                    .await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("bridge.setConcurrency.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SetConcurrencyRequest = params.parse()?;
                    facade::call("bridge.setConcurrency.v1", req, |req| async move {
                        handler.set_concurrency(req).await
                    })
                    .await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("bridge.stats.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatsRequest = params.parse()?;
                    facade::call("bridge.stats.v1", req, |req| async move {
                        handler.stats(req).await
                    })
                    .await
                }
            })
            .map_err(|e| e.to_string())?;

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok(handle)
    }
}
