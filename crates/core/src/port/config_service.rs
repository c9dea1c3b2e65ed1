// Configuration Service Port
// The hierarchical AppConfig -> QueueConfig -> CallbackConfig snapshot is
// owned by an external configuration service. The core reads immutable
// snapshots and listens for change notifications carrying no payload
// ("re-read the snapshot now").

use crate::domain::{AppConfig, CallbackConfig};
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::watch;

#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Latest full configuration snapshot.
    async fn snapshot(&self) -> Result<Vec<AppConfig>>;

    /// Subscriber list for one (app, queue). Missing app or queue yields an
    /// empty list; the caller decides whether that is an unroutable message
    /// or simply a queue with no subscribers.
    async fn callback_configs(&self, app_id: &str, queue_code: &str) -> Result<Vec<CallbackConfig>>;

    /// Change notifications. The carried value is an opaque version counter;
    /// any observed change means the snapshot must be re-read.
    fn changes(&self) -> watch::Receiver<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// In-memory config service whose snapshot can be replaced at runtime,
    /// firing the change notifier like a real config push would.
    pub struct MockConfigService {
        snapshot: RwLock<Vec<AppConfig>>,
        version_tx: watch::Sender<u64>,
    }

    impl MockConfigService {
        pub fn new(snapshot: Vec<AppConfig>) -> Arc<Self> {
            let (version_tx, _) = watch::channel(0);
            Arc::new(Self {
                snapshot: RwLock::new(snapshot),
                version_tx,
            })
        }

        /// Replace the snapshot and notify subscribers.
        pub async fn replace(&self, snapshot: Vec<AppConfig>) {
            *self.snapshot.write().await = snapshot;
            self.version_tx.send_modify(|v| *v += 1);
        }
    }

    #[async_trait]
    impl ConfigService for MockConfigService {
        async fn snapshot(&self) -> Result<Vec<AppConfig>> {
            Ok(self.snapshot.read().await.clone())
        }

        async fn callback_configs(
            &self,
            app_id: &str,
            queue_code: &str,
        ) -> Result<Vec<CallbackConfig>> {
            let snapshot = self.snapshot.read().await;
            Ok(snapshot
                .iter()
                .filter(|app| app.app_id == app_id)
                .flat_map(|app| &app.queues)
                .filter(|queue| queue.code == queue_code)
                .flat_map(|queue| queue.callbacks.clone())
                .collect())
        }

        fn changes(&self) -> watch::Receiver<u64> {
            self.version_tx.subscribe()
        }
    }
}
