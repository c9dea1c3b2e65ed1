// Consumer Lifecycle Reconciler
//
// Keeps the consumer registry equal to the desired set implied by the
// latest configuration snapshot. Each pass is a pure set-diff over
// idempotent start/stop, so re-running against an unchanged snapshot is a
// no-op and concurrent passes converge to the same fixed point.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::application::registry::ConsumerRegistry;
use crate::application::worker::ShutdownToken;
use crate::domain::{Cluster, ConsumerBinding, ConsumerIdentity, DispatchGroups};
use crate::error::Result;
use crate::port::ConfigService;

/// What one reconciliation pass did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub started: usize,
    pub stopped: usize,
    /// Start attempts that failed; retried on the next trigger
    pub failed: usize,
}

pub struct Reconciler {
    config_service: Arc<dyn ConfigService>,
    registry: Arc<ConsumerRegistry>,
    groups: DispatchGroups,
}

impl Reconciler {
    pub fn new(
        config_service: Arc<dyn ConfigService>,
        registry: Arc<ConsumerRegistry>,
        groups: DispatchGroups,
    ) -> Self {
        Self {
            config_service,
            registry,
            groups,
        }
    }

    /// One reconciliation pass: compute the desired set from the snapshot,
    /// diff it against the registry, start the missing and stop the
    /// extraneous. A failure starting one identity is logged and counted
    /// but never aborts the pass.
    pub async fn reconcile(&self) -> Result<ReconcileStats> {
        let snapshot = self.config_service.snapshot().await?;

        let mut desired: HashMap<ConsumerIdentity, ConsumerBinding> = HashMap::new();
        for app in &snapshot {
            if !self.groups.matches(&app.dispatch_group) {
                continue;
            }
            for queue in &app.queues {
                for callback in &queue.callbacks {
                    if !queue.wants_consumer(callback) {
                        continue;
                    }
                    for cluster in Cluster::ALL {
                        let binding = ConsumerBinding {
                            app_id: app.app_id.clone(),
                            queue_code: queue.code.clone(),
                            callback_key: callback.callback_key.clone(),
                            cluster,
                        };
                        desired.insert(binding.identity(), binding);
                    }
                }
            }
        }

        let running = self.registry.snapshot().await;
        let mut stats = ReconcileStats::default();

        for (identity, binding) in &desired {
            if running.contains(identity) {
                continue;
            }
            match self
                .registry
                .start(
                    &binding.app_id,
                    &binding.queue_code,
                    &binding.callback_key,
                    binding.cluster,
                )
                .await
            {
                Ok(()) => stats.started += 1,
                Err(e) => {
                    // Retried on the next trigger rather than immediately,
                    // so a persistently failing dependency is not hammered.
                    error!(consumer = %identity, error = %e, "Failed to start consumer");
                    stats.failed += 1;
                }
            }
        }

        for identity in &running {
            if desired.contains_key(identity) {
                continue;
            }
            self.registry
                .stop(&identity.callback_key, identity.cluster)
                .await;
            stats.stopped += 1;
        }

        if stats != ReconcileStats::default() {
            info!(
                started = stats.started,
                stopped = stats.stopped,
                failed = stats.failed,
                "Reconciliation pass applied changes"
            );
        }
        Ok(stats)
    }

    /// Run an initial pass, then one pass per configuration-change
    /// notification, until shutdown. A failed pass is logged and the loop
    /// keeps listening; the next notification retries.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownToken) {
        let mut changes = self.config_service.changes();

        if let Err(e) = self.reconcile().await {
            error!(error = %e, "Initial reconciliation failed");
        }

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!("Reconciler shutting down");
                    break;
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        // Notifier dropped; nothing further can change.
                        info!("Configuration notifier closed, reconciler exiting");
                        break;
                    }
                    if let Err(e) = self.reconcile().await {
                        error!(error = %e, "Reconciliation pass failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::semaphore::AdjustableSemaphore;
    use crate::application::{DispatchConfig, DispatchService};
    use crate::domain::{AppConfig, CallbackConfig, QueueConfig};
    use crate::port::broker::mocks::{MockBroker, PartiallyUnreachableBroker};
    use crate::port::config_service::mocks::MockConfigService;
    use crate::port::outcome_store::mocks::RecordingOutcomeStore;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::webhook_transport::mocks::MockTransport;
    use crate::port::BrokerConnector;

    fn snapshot(queue_enable: bool, cb_enable: bool) -> Vec<AppConfig> {
        vec![AppConfig {
            app_id: "A".to_string(),
            dispatch_group: String::new(),
            queues: vec![QueueConfig {
                code: "orders".to_string(),
                enable: queue_enable,
                callbacks: vec![CallbackConfig {
                    callback_key: "cb1".to_string(),
                    url: "http://localhost/cb1".to_string(),
                    enable: cb_enable,
                    timeout_ms: None,
                }],
            }],
        }]
    }

    fn build(
        config: Arc<MockConfigService>,
        broker: Arc<dyn BrokerConnector>,
        groups: DispatchGroups,
    ) -> (Arc<Reconciler>, Arc<ConsumerRegistry>) {
        let dispatcher = Arc::new(DispatchService::new(
            config.clone(),
            MockTransport::new(),
            RecordingOutcomeStore::new(),
            Arc::new(AdjustableSemaphore::new(4)),
            Arc::new(SystemTimeProvider),
            DispatchConfig::default(),
        ));
        let registry = Arc::new(ConsumerRegistry::new(broker, dispatcher));
        let reconciler = Arc::new(Reconciler::new(config, registry.clone(), groups));
        (reconciler, registry)
    }

    #[tokio::test]
    async fn test_enabled_callback_starts_one_consumer_per_cluster() {
        let config = MockConfigService::new(snapshot(true, true));
        let (reconciler, registry) =
            build(config, MockBroker::new(), DispatchGroups::default());

        let stats = reconciler.reconcile().await.unwrap();
        assert_eq!(stats.started, 2);
        assert_eq!(stats.stopped, 0);

        let running = registry.snapshot().await;
        assert!(running.contains(&ConsumerIdentity::new("cb1", Cluster::Master)));
        assert!(running.contains(&ConsumerIdentity::new("cb1", Cluster::Slave)));
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_converges_to_no_op() {
        let config = MockConfigService::new(snapshot(true, true));
        let (reconciler, _registry) =
            build(config, MockBroker::new(), DispatchGroups::default());

        reconciler.reconcile().await.unwrap();
        let second = reconciler.reconcile().await.unwrap();
        assert_eq!(second, ReconcileStats::default());
    }

    #[tokio::test]
    async fn test_disabling_callback_stops_both_clusters() {
        let config = MockConfigService::new(snapshot(true, true));
        let (reconciler, registry) =
            build(config.clone(), MockBroker::new(), DispatchGroups::default());

        reconciler.reconcile().await.unwrap();
        assert_eq!(registry.len().await, 2);

        config.replace(snapshot(true, false)).await;
        let stats = reconciler.reconcile().await.unwrap();
        assert_eq!(stats.stopped, 2);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_queue_disable_overrides_callback_enable() {
        let config = MockConfigService::new(snapshot(false, true));
        let (reconciler, registry) =
            build(config, MockBroker::new(), DispatchGroups::default());

        reconciler.reconcile().await.unwrap();
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_removed_app_stops_orphaned_consumers() {
        let config = MockConfigService::new(snapshot(true, true));
        let (reconciler, registry) =
            build(config.clone(), MockBroker::new(), DispatchGroups::default());

        reconciler.reconcile().await.unwrap();
        assert_eq!(registry.len().await, 2);

        // The app disappears entirely; its consumers must still be found
        // and stopped by the registry diff.
        config.replace(vec![]).await;
        let stats = reconciler.reconcile().await.unwrap();
        assert_eq!(stats.stopped, 2);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_dispatch_group_mismatch_is_skipped() {
        let mut apps = snapshot(true, true);
        apps[0].dispatch_group = "other-shard".to_string();
        let config = MockConfigService::new(apps);
        let (reconciler, registry) = build(
            config,
            MockBroker::new(),
            DispatchGroups::new(vec!["this-shard".to_string()]),
        );

        reconciler.reconcile().await.unwrap();
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_one_failing_start_does_not_abort_the_pass() {
        let mut apps = snapshot(true, true);
        apps[0].queues[0].callbacks.push(CallbackConfig {
            callback_key: "cb2".to_string(),
            url: "http://localhost/cb2".to_string(),
            enable: true,
            timeout_ms: None,
        });
        let config = MockConfigService::new(apps);

        let inner = MockBroker::new();
        let broker = Arc::new(PartiallyUnreachableBroker::new(
            inner,
            vec!["cb1".to_string()],
        ));
        let (reconciler, registry) = build(config, broker, DispatchGroups::default());

        let stats = reconciler.reconcile().await.unwrap();
        assert_eq!(stats.failed, 2, "cb1 fails on both clusters");
        assert_eq!(stats.started, 2, "cb2 still starts on both clusters");

        let running = registry.snapshot().await;
        assert!(running.contains(&ConsumerIdentity::new("cb2", Cluster::Master)));
        assert!(!running.contains(&ConsumerIdentity::new("cb1", Cluster::Master)));
    }

    #[tokio::test]
    async fn test_run_reacts_to_change_notifications() {
        let config = MockConfigService::new(snapshot(true, true));
        let (reconciler, registry) =
            build(config.clone(), MockBroker::new(), DispatchGroups::default());

        let (shutdown_tx, shutdown_rx) = crate::application::worker::shutdown_channel();
        let handle = tokio::spawn(reconciler.run(shutdown_rx));

        // Initial pass brings up both clusters.
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while registry.len().await != 2 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("initial reconciliation should start consumers");

        // Notifier fires after the callback is disabled.
        config.replace(snapshot(true, false)).await;
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while !registry.is_empty().await {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("change notification should stop consumers");

        shutdown_tx.shutdown();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(2), handle).await;
    }
}
