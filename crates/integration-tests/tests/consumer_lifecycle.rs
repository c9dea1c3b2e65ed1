//! Consumer Lifecycle Integration Tests
//!
//! Drives the reconciler against a live broker adapter and verifies that
//! the running consumer set tracks the configuration snapshot.

use std::sync::Arc;
use std::time::Duration;

use hookbridge_core::application::worker::shutdown_channel;
use hookbridge_core::application::{
    AdjustableSemaphore, ConsumerRegistry, DispatchConfig, DispatchService, Reconciler,
};
use hookbridge_core::domain::{
    AppConfig, CallbackConfig, Cluster, ConsumerIdentity, DispatchGroups, QueueConfig,
};
use hookbridge_core::port::config_service::mocks::MockConfigService;
use hookbridge_core::port::outcome_store::mocks::RecordingOutcomeStore;
use hookbridge_core::port::webhook_transport::mocks::MockTransport;
use hookbridge_core::port::SystemTimeProvider;
use hookbridge_infra_broker::InMemoryBroker;

fn callback(key: &str, enable: bool) -> CallbackConfig {
    CallbackConfig {
        callback_key: key.to_string(),
        url: format!("http://localhost/hooks/{}", key),
        enable,
        timeout_ms: None,
    }
}

fn app(app_id: &str, queue_code: &str, callbacks: Vec<CallbackConfig>) -> AppConfig {
    AppConfig {
        app_id: app_id.to_string(),
        dispatch_group: String::new(),
        queues: vec![QueueConfig {
            code: queue_code.to_string(),
            enable: true,
            callbacks,
        }],
    }
}

struct Harness {
    config_service: Arc<MockConfigService>,
    registry: Arc<ConsumerRegistry>,
    reconciler: Arc<Reconciler>,
}

fn harness(snapshot: Vec<AppConfig>) -> Harness {
    let config_service = MockConfigService::new(snapshot);
    let dispatcher = Arc::new(DispatchService::new(
        config_service.clone(),
        MockTransport::new(),
        RecordingOutcomeStore::new(),
        Arc::new(AdjustableSemaphore::new(8)),
        Arc::new(SystemTimeProvider),
        DispatchConfig::default(),
    ));
    let registry = Arc::new(ConsumerRegistry::new(InMemoryBroker::new(), dispatcher));
    let reconciler = Arc::new(Reconciler::new(
        config_service.clone(),
        registry.clone(),
        DispatchGroups::default(),
    ));

    Harness {
        config_service,
        registry,
        reconciler,
    }
}

async fn wait_for_len(registry: &ConsumerRegistry, expected: usize) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if registry.len().await == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    registry.len().await == expected
}

#[tokio::test]
async fn boot_pass_starts_one_consumer_per_callback_per_cluster() {
    let h = harness(vec![
        app("app1", "orders", vec![callback("cb1", true)]),
        app("app2", "billing", vec![callback("cb2", true)]),
    ]);

    let stats = h.reconciler.reconcile().await.unwrap();
    assert_eq!(stats.started, 4);
    assert_eq!(stats.stopped, 0);
    assert_eq!(stats.failed, 0);

    let snapshot = h.registry.snapshot().await;
    for key in ["cb1", "cb2"] {
        for cluster in Cluster::ALL {
            assert!(
                snapshot.contains(&ConsumerIdentity::new(key, cluster)),
                "missing consumer {}_{}",
                key,
                cluster
            );
        }
    }
}

#[tokio::test]
async fn disabling_a_callback_stops_it_on_both_clusters() {
    let h = harness(vec![app(
        "app1",
        "orders",
        vec![callback("cb1", true), callback("cb2", true)],
    )]);

    h.reconciler.reconcile().await.unwrap();
    assert_eq!(h.registry.len().await, 4);

    h.config_service
        .replace(vec![app(
            "app1",
            "orders",
            vec![callback("cb1", true), callback("cb2", false)],
        )])
        .await;

    let stats = h.reconciler.reconcile().await.unwrap();
    assert_eq!(stats.stopped, 2);

    let snapshot = h.registry.snapshot().await;
    assert_eq!(snapshot.len(), 2);
    for cluster in Cluster::ALL {
        assert!(snapshot.contains(&ConsumerIdentity::new("cb1", cluster)));
        assert!(!snapshot.contains(&ConsumerIdentity::new("cb2", cluster)));
    }
}

#[tokio::test]
async fn removing_an_application_stops_its_consumers() {
    let h = harness(vec![
        app("app1", "orders", vec![callback("cb1", true)]),
        app("app2", "billing", vec![callback("cb2", true)]),
    ]);

    h.reconciler.reconcile().await.unwrap();
    assert_eq!(h.registry.len().await, 4);

    h.config_service
        .replace(vec![app("app1", "orders", vec![callback("cb1", true)])])
        .await;

    let stats = h.reconciler.reconcile().await.unwrap();
    assert_eq!(stats.stopped, 2);
    assert_eq!(h.registry.len().await, 2);
}

#[tokio::test]
async fn background_loop_converges_after_a_config_push() {
    let h = harness(vec![app("app1", "orders", vec![callback("cb1", true)])]);

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let loop_handle = tokio::spawn(h.reconciler.clone().run(shutdown_rx));

    assert!(wait_for_len(&h.registry, 2).await, "initial pass never ran");

    h.config_service
        .replace(vec![app(
            "app1",
            "orders",
            vec![callback("cb1", true), callback("cb3", true)],
        )])
        .await;

    assert!(
        wait_for_len(&h.registry, 4).await,
        "config push was not picked up"
    );

    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(1), loop_handle).await;
}
