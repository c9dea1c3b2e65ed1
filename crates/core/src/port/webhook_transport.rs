// Webhook Transport Port
// Outbound HTTP surface: one POST per (message, subscriber), body = payload,
// success-range status = delivery success.

use crate::domain::{CallbackConfig, Message};
use async_trait::async_trait;
use thiserror::Error;

/// Delivery failure kinds, kept apart so outcome records stay precise
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Delivery timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Non-success status: {0}")]
    Status(u16),
}

#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Invoke one subscriber's webhook with the message payload.
    ///
    /// # Errors
    /// - DeliveryError::Timeout when connection or response exceeded the
    ///   per-call timeout
    /// - DeliveryError::Status for responses outside the success range
    /// - DeliveryError::Network for transport failures
    async fn deliver(&self, message: &Message, callback: &CallbackConfig)
        -> Result<(), DeliveryError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Scripted behavior per callback key
    #[derive(Debug, Clone)]
    pub enum MockDelivery {
        /// Respond with success after the given artificial latency
        Succeed(Duration),
        /// Fail with the given error
        Fail(DeliveryError),
    }

    /// Mock transport delivering per-key scripted results and counting calls
    pub struct MockTransport {
        behaviors: Mutex<HashMap<String, MockDelivery>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                behaviors: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub async fn script(&self, callback_key: impl Into<String>, behavior: MockDelivery) {
            self.behaviors
                .lock()
                .await
                .insert(callback_key.into(), behavior);
        }

        /// Callback keys invoked so far, in invocation order
        pub async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl WebhookTransport for MockTransport {
        async fn deliver(
            &self,
            _message: &Message,
            callback: &CallbackConfig,
        ) -> Result<(), DeliveryError> {
            self.calls.lock().await.push(callback.callback_key.clone());

            let behavior = self
                .behaviors
                .lock()
                .await
                .get(&callback.callback_key)
                .cloned()
                .unwrap_or(MockDelivery::Succeed(Duration::from_millis(0)));

            match behavior {
                MockDelivery::Succeed(latency) => {
                    if !latency.is_zero() {
                        tokio::time::sleep(latency).await;
                    }
                    Ok(())
                }
                MockDelivery::Fail(err) => Err(err),
            }
        }
    }
}
