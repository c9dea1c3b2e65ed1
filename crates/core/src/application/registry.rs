// Consumer Registry
//
// Authoritative in-memory record of running consumers. The registry owns
// the identity -> handle map. A start reserves its identity in a pending
// set before touching the broker, so two starts for the same identity can
// never race into a double registration, and no registry lock is ever held
// across the broker open. Snapshot reads stay cheap.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::dispatch::DispatchService;
use crate::application::worker::constants::STOP_ALL_DRAIN_TIMEOUT;
use crate::application::worker::{shutdown_channel, ConsumerWorker, ShutdownSender};
use crate::domain::{Cluster, ConsumerBinding, ConsumerIdentity};
use crate::error::Result;
use crate::port::BrokerConnector;

/// Handle to one running consuming worker
struct ConsumerHandle {
    shutdown: ShutdownSender,
    task: JoinHandle<()>,
}

pub struct ConsumerRegistry {
    consumers: RwLock<HashMap<ConsumerIdentity, ConsumerHandle>>,
    /// Identities with a broker open in flight. Reserved before the open
    /// and resolved after it, so the open itself happens outside any
    /// registry lock.
    pending: Mutex<HashSet<ConsumerIdentity>>,
    broker: Arc<dyn BrokerConnector>,
    dispatcher: Arc<DispatchService>,
}

impl ConsumerRegistry {
    pub fn new(broker: Arc<dyn BrokerConnector>, dispatcher: Arc<DispatchService>) -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
            broker,
            dispatcher,
        }
    }

    /// Start a consuming worker for the derived identity. Idempotent: a
    /// live handle or an in-flight start for the identity makes this a
    /// no-op.
    ///
    /// On a failed broker open nothing is registered and the error is
    /// returned, so the identity is either fully running or fully absent.
    pub async fn start(
        &self,
        app_id: &str,
        queue_code: &str,
        callback_key: &str,
        cluster: Cluster,
    ) -> Result<()> {
        let binding = ConsumerBinding {
            app_id: app_id.to_string(),
            queue_code: queue_code.to_string(),
            callback_key: callback_key.to_string(),
            cluster,
        };
        let identity = binding.identity();

        // Reserve the identity before the broker open. Duplicate starts
        // collapse onto the reservation, while the open itself runs outside
        // every registry lock so reads and starts of other identities are
        // never stalled behind a slow broker.
        {
            let consumers = self.consumers.read().await;
            let mut pending = self.pending.lock().await;
            if consumers.contains_key(&identity) || !pending.insert(identity.clone()) {
                return Ok(());
            }
        }

        let stream = match self.broker.open(&binding).await {
            Ok(stream) => stream,
            Err(e) => {
                self.pending.lock().await.remove(&identity);
                return Err(e.into());
            }
        };

        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        let worker = ConsumerWorker::new(binding, stream, Arc::clone(&self.dispatcher));
        let task = tokio::spawn(worker.run(shutdown_rx));

        info!(consumer = %identity, "Started message consumer");
        let mut consumers = self.consumers.write().await;
        self.pending.lock().await.remove(&identity);
        consumers.insert(
            identity,
            ConsumerHandle {
                shutdown: shutdown_tx,
                task,
            },
        );
        Ok(())
    }

    /// Stop the worker for the derived identity. Idempotent: an absent
    /// identity is a no-op. Deliveries already admitted past the semaphore
    /// run to completion.
    pub async fn stop(&self, callback_key: &str, cluster: Cluster) {
        let identity = ConsumerIdentity::new(callback_key, cluster);

        let handle = self.consumers.write().await.remove(&identity);
        if let Some(handle) = handle {
            info!(consumer = %identity, "Stopping message consumer");
            handle.shutdown.shutdown();
        }
    }

    /// Current set of running identities (for the reconciler's diff and for
    /// observability).
    pub async fn snapshot(&self) -> HashSet<ConsumerIdentity> {
        self.consumers.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.consumers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.consumers.read().await.is_empty()
    }

    /// Stop every consumer and wait (bounded) for the worker tasks to wind
    /// down. Used on daemon shutdown.
    pub async fn stop_all(&self) {
        let handles: Vec<(ConsumerIdentity, ConsumerHandle)> =
            self.consumers.write().await.drain().collect();

        for (_, handle) in &handles {
            handle.shutdown.shutdown();
        }
        for (identity, handle) in handles {
            if tokio::time::timeout(STOP_ALL_DRAIN_TIMEOUT, handle.task)
                .await
                .is_err()
            {
                warn!(consumer = %identity, "Consumer did not stop within drain timeout");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::semaphore::AdjustableSemaphore;
    use crate::application::{DispatchConfig, DispatchService};
    use crate::port::broker::mocks::{MockBroker, SlowOpenBroker, UnreachableBroker};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use crate::port::config_service::mocks::MockConfigService;
    use crate::port::outcome_store::mocks::RecordingOutcomeStore;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::webhook_transport::mocks::MockTransport;

    fn dispatcher() -> Arc<DispatchService> {
        Arc::new(DispatchService::new(
            MockConfigService::new(vec![]),
            MockTransport::new(),
            RecordingOutcomeStore::new(),
            Arc::new(AdjustableSemaphore::new(4)),
            Arc::new(SystemTimeProvider),
            DispatchConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_start_registers_identity() {
        let registry = ConsumerRegistry::new(MockBroker::new(), dispatcher());

        registry
            .start("A", "orders", "cb1", Cluster::Master)
            .await
            .unwrap();

        let snapshot = registry.snapshot().await;
        assert!(snapshot.contains(&ConsumerIdentity::new("cb1", Cluster::Master)));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let broker = MockBroker::new();
        let registry = ConsumerRegistry::new(broker.clone(), dispatcher());

        registry
            .start("A", "orders", "cb1", Cluster::Master)
            .await
            .unwrap();
        registry
            .start("A", "orders", "cb1", Cluster::Master)
            .await
            .unwrap();

        assert_eq!(registry.len().await, 1);
        assert_eq!(broker.open_count().await, 1, "second start must not reopen");
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let registry = ConsumerRegistry::new(MockBroker::new(), dispatcher());

        registry
            .start("A", "orders", "cb1", Cluster::Master)
            .await
            .unwrap();

        registry.stop("cb1", Cluster::Master).await;
        registry.stop("cb1", Cluster::Master).await; // absent: no-op

        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_start_leaves_no_partial_registration() {
        let registry = ConsumerRegistry::new(Arc::new(UnreachableBroker), dispatcher());

        let result = registry.start("A", "orders", "cb1", Cluster::Master).await;
        assert!(result.is_err());
        assert!(registry.is_empty().await);

        // The reservation is released on failure: a retry reaches the
        // broker again rather than short-circuiting as already started.
        let retry = registry.start("A", "orders", "cb1", Cluster::Master).await;
        assert!(retry.is_err());
    }

    #[tokio::test]
    async fn test_slow_open_does_not_block_registry_operations() {
        let inner = MockBroker::new();
        let broker = Arc::new(SlowOpenBroker::new(
            inner,
            vec!["cb-slow".to_string()],
            Duration::from_millis(300),
        ));
        let registry = Arc::new(ConsumerRegistry::new(broker, dispatcher()));

        let slow_start = {
            let registry = registry.clone();
            tokio::spawn(
                async move { registry.start("A", "orders", "cb-slow", Cluster::Master).await },
            )
        };
        sleep(Duration::from_millis(30)).await;

        // Reads, stops and starts of other identities proceed while the
        // slow open is still in flight.
        timeout(Duration::from_millis(100), registry.snapshot())
            .await
            .expect("snapshot must not wait on an in-flight open");
        timeout(Duration::from_millis(100), registry.stop("cb2", Cluster::Master))
            .await
            .expect("stop must not wait on an in-flight open");
        timeout(
            Duration::from_millis(100),
            registry.start("A", "orders", "cb2", Cluster::Master),
        )
        .await
        .expect("another identity's start must not wait on an in-flight open")
        .unwrap();

        slow_start.await.unwrap().unwrap();
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_start_during_in_flight_open_opens_once() {
        let inner = MockBroker::new();
        let broker = Arc::new(SlowOpenBroker::new(
            inner.clone(),
            vec!["cb1".to_string()],
            Duration::from_millis(200),
        ));
        let registry = Arc::new(ConsumerRegistry::new(broker, dispatcher()));

        let first = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.start("A", "orders", "cb1", Cluster::Master).await })
        };
        sleep(Duration::from_millis(30)).await;

        // Second start lands while the first open is in flight: it must
        // collapse onto the reservation instead of opening again.
        registry
            .start("A", "orders", "cb1", Cluster::Master)
            .await
            .unwrap();

        first.await.unwrap().unwrap();
        assert_eq!(registry.len().await, 1);
        assert_eq!(inner.open_count().await, 1);
    }

    #[tokio::test]
    async fn test_clusters_are_independent_identities() {
        let registry = ConsumerRegistry::new(MockBroker::new(), dispatcher());

        registry
            .start("A", "orders", "cb1", Cluster::Master)
            .await
            .unwrap();
        registry
            .start("A", "orders", "cb1", Cluster::Slave)
            .await
            .unwrap();

        assert_eq!(registry.len().await, 2);

        registry.stop("cb1", Cluster::Slave).await;
        let snapshot = registry.snapshot().await;
        assert!(snapshot.contains(&ConsumerIdentity::new("cb1", Cluster::Master)));
        assert!(!snapshot.contains(&ConsumerIdentity::new("cb1", Cluster::Slave)));
    }
}
