//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method. Handlers
//! return `AppError`; the facade envelope maps it to RPC error codes.

use crate::types::{
    ConsumerInfo, ConsumersRequest, ConsumersResponse, PublishRequest, PublishResponse,
    ReloadRequest, ReloadResponse, SetConcurrencyRequest, SetConcurrencyResponse, StatsRequest,
    StatsResponse,
};
use hookbridge_core::application::{AdjustableSemaphore, ConsumerRegistry, Reconciler};
use hookbridge_core::domain::{Cluster, Message};
use hookbridge_core::error::Result;
use hookbridge_core::port::{IdProvider, MessagePublisher, TimeProvider};
use std::sync::Arc;
use std::time::Instant;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    publisher: Arc<dyn MessagePublisher>,
    registry: Arc<ConsumerRegistry>,
    reconciler: Arc<Reconciler>,
    semaphore: Arc<AdjustableSemaphore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        publisher: Arc<dyn MessagePublisher>,
        registry: Arc<ConsumerRegistry>,
        reconciler: Arc<Reconciler>,
        semaphore: Arc<AdjustableSemaphore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            publisher,
            registry,
            reconciler,
            semaphore,
            id_provider,
            time_provider,
            start_time: Instant::now(),
        }
    }

    /// bridge.publish.v1
    pub async fn publish(&self, params: PublishRequest) -> Result<PublishResponse> {
        let cluster = Cluster::parse(&params.cluster)?;

        let message = Message::new(
            self.id_provider.generate_id(),
            params.app_id.clone(),
            params.queue_code.clone(),
            params.payload,
            self.time_provider.now_millis(),
        );
        let message_id = message.id.clone();

        self.publisher.publish(cluster, message).await?;

        Ok(PublishResponse {
            message_id,
            app_id: params.app_id,
            queue_code: params.queue_code,
            cluster: cluster.as_str().to_string(),
        })
    }

    /// bridge.consumers.v1
    pub async fn consumers(&self, _params: ConsumersRequest) -> Result<ConsumersResponse> {
        let mut consumers: Vec<ConsumerInfo> = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|identity| ConsumerInfo {
                callback_key: identity.callback_key,
                cluster: identity.cluster.as_str().to_string(),
            })
            .collect();

        consumers.sort_by(|a, b| {
            (a.callback_key.as_str(), a.cluster.as_str())
                .cmp(&(b.callback_key.as_str(), b.cluster.as_str()))
        });

        Ok(ConsumersResponse { consumers })
    }

    /// bridge.reload.v1
    pub async fn reload(&self, _params: ReloadRequest) -> Result<ReloadResponse> {
        let stats = self.reconciler.reconcile().await?;

        Ok(ReloadResponse {
            started: stats.started,
            stopped: stats.stopped,
            failed: stats.failed,
            running: self.registry.len().await,
        })
    }

    /// bridge.setConcurrency.v1
    pub async fn set_concurrency(
        &self,
        params: SetConcurrencyRequest,
    ) -> Result<SetConcurrencyResponse> {
        self.semaphore.set_capacity(params.capacity);

        Ok(SetConcurrencyResponse {
            capacity: self.semaphore.capacity(),
            available: self.semaphore.available(),
        })
    }

    /// bridge.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> Result<StatsResponse> {
        Ok(StatsResponse {
            running_consumers: self.registry.len().await,
            dispatch_capacity: self.semaphore.capacity(),
            dispatch_available: self.semaphore.available(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }
}
