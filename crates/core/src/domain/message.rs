// Message Domain Model

use serde::{Deserialize, Serialize};

/// Message ID (UUID v4)
pub type MessageId = String;

/// One broker delivery.
///
/// Acknowledgement metadata stays with the broker adapter; the core only
/// needs enough to route and fan out the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub app_id: String,
    pub queue_code: String,
    pub payload: serde_json::Value,
    /// Epoch ms at which the broker accepted the message
    pub enqueued_at: i64,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        app_id: impl Into<String>,
        queue_code: impl Into<String>,
        payload: serde_json::Value,
        enqueued_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            app_id: app_id.into(),
            queue_code: queue_code.into(),
            payload,
            enqueued_at,
        }
    }
}
