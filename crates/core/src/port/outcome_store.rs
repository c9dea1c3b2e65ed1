// Outcome Store Port
// Per-subscriber delivery status is persisted by an external collaborator.
// The guaranteed contract is observability: every outcome is recorded,
// nothing is silently dropped.

use crate::domain::DispatchOutcome;
use async_trait::async_trait;

#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Record one (message, subscriber) outcome. Must not fail the dispatch
    /// path; implementations swallow and log their own storage errors.
    async fn record(&self, outcome: DispatchOutcome);
}

/// Default store writing outcomes to the structured log. Deployments with a
/// real delivery-status service swap in their own adapter.
pub struct LogOutcomeStore;

#[async_trait]
impl OutcomeStore for LogOutcomeStore {
    async fn record(&self, outcome: DispatchOutcome) {
        use crate::domain::OutcomeKind;

        match &outcome.kind {
            OutcomeKind::Delivered => tracing::info!(
                message_id = %outcome.message_id,
                callback_key = %outcome.callback_key,
                "Delivery succeeded"
            ),
            OutcomeKind::AdmissionRejected => tracing::warn!(
                message_id = %outcome.message_id,
                callback_key = %outcome.callback_key,
                "Delivery rejected by admission control"
            ),
            OutcomeKind::DeliveryFailed(reason) => tracing::error!(
                message_id = %outcome.message_id,
                callback_key = %outcome.callback_key,
                reason = %reason,
                "Delivery failed"
            ),
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{Mutex, Notify};

    /// Store capturing outcomes in memory, with an awaitable count for
    /// tests observing fire-and-forget dispatch tasks.
    pub struct RecordingOutcomeStore {
        outcomes: Mutex<Vec<DispatchOutcome>>,
        notify: Notify,
    }

    impl RecordingOutcomeStore {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(Vec::new()),
                notify: Notify::new(),
            })
        }

        pub async fn outcomes(&self) -> Vec<DispatchOutcome> {
            self.outcomes.lock().await.clone()
        }

        /// Wait until at least `n` outcomes are recorded.
        /// Returns false on timeout.
        pub async fn wait_for(&self, n: usize, timeout: Duration) -> bool {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                if self.outcomes.lock().await.len() >= n {
                    return true;
                }
                let notified = self.notify.notified();
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return self.outcomes.lock().await.len() >= n;
                }
            }
        }
    }

    #[async_trait]
    impl OutcomeStore for RecordingOutcomeStore {
        async fn record(&self, outcome: DispatchOutcome) {
            self.outcomes.lock().await.push(outcome);
            self.notify.notify_waiters();
        }
    }
}
