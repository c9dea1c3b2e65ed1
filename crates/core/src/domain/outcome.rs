// Dispatch Outcome Model
//
// One outcome per (message, subscriber). Admission-control rejection is a
// distinct kind from delivery failure so records and metrics can tell an
// exhausted concurrency budget apart from a broken subscriber.

use serde::{Deserialize, Serialize};

/// Per-subscriber result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind", content = "detail")]
pub enum OutcomeKind {
    /// Subscriber responded with a success-range status
    Delivered,
    /// Semaphore wait timed out before the webhook was invoked
    AdmissionRejected,
    /// Transport failure, non-success status, or response timeout
    DeliveryFailed(String),
}

impl OutcomeKind {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Delivered)
    }
}

/// Outcome record handed to the external delivery-status store.
/// Never held in memory past the dispatch call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub message_id: String,
    pub app_id: String,
    pub queue_code: String,
    pub callback_key: String,
    pub kind: OutcomeKind,
    /// Epoch ms at which the outcome was observed
    pub recorded_at: i64,
}
