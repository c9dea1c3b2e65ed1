// Broker Port
// Abstraction over the clustered message broker. The real client (connection
// management, queue binding, acknowledgement protocol) is an external
// collaborator; the core only needs "a stream of messages for one binding"
// plus an intake side for adapters that also accept publishes.

use crate::domain::{Cluster, ConsumerBinding, Message};
use async_trait::async_trait;
use thiserror::Error;

/// Broker-side errors
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Broker unreachable: {0}")]
    Unreachable(String),

    #[error("Queue full: {0}")]
    QueueFull(String),

    #[error("Unknown queue: {0}")]
    UnknownQueue(String),
}

/// A live subscription to one queue on one cluster.
#[async_trait]
pub trait MessageStream: Send {
    /// Next delivery, or None once the broker closes the subscription.
    async fn next(&mut self) -> Option<Message>;
}

/// Opens consuming streams against the broker.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a stream for the given binding.
    ///
    /// # Errors
    /// - BrokerError::Unreachable if the broker cannot be reached; the
    ///   caller must not retain any partial consumer state in that case
    async fn open(&self, binding: &ConsumerBinding) -> Result<Box<dyn MessageStream>, BrokerError>;
}

/// Intake side of a broker adapter (used by the RPC publish surface and
/// by tests; a production deployment publishes straight to the broker).
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, cluster: Cluster, message: Message) -> Result<(), BrokerError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex};

    /// Stream over a plain mpsc receiver
    pub struct ChannelStream {
        rx: mpsc::Receiver<Message>,
    }

    #[async_trait]
    impl MessageStream for ChannelStream {
        async fn next(&mut self) -> Option<Message> {
            self.rx.recv().await
        }
    }

    /// Mock broker handing each opened binding its own channel.
    ///
    /// Senders are retained per identity so tests can inject deliveries
    /// into a specific consumer.
    pub struct MockBroker {
        senders: Mutex<HashMap<ConsumerBinding, mpsc::Sender<Message>>>,
        open_count: Mutex<usize>,
    }

    impl MockBroker {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                senders: Mutex::new(HashMap::new()),
                open_count: Mutex::new(0),
            })
        }

        /// Push a message into the stream opened for `binding`.
        pub async fn inject(&self, binding: &ConsumerBinding, message: Message) -> bool {
            let senders = self.senders.lock().await;
            match senders.get(binding) {
                Some(tx) => tx.send(message).await.is_ok(),
                None => false,
            }
        }

        pub async fn open_count(&self) -> usize {
            *self.open_count.lock().await
        }
    }

    #[async_trait]
    impl BrokerConnector for MockBroker {
        async fn open(
            &self,
            binding: &ConsumerBinding,
        ) -> Result<Box<dyn MessageStream>, BrokerError> {
            let (tx, rx) = mpsc::channel(64);
            self.senders.lock().await.insert(binding.clone(), tx);
            *self.open_count.lock().await += 1;
            Ok(Box::new(ChannelStream { rx }))
        }
    }

    /// Broker whose `open` always fails (start-failure containment tests)
    pub struct UnreachableBroker;

    #[async_trait]
    impl BrokerConnector for UnreachableBroker {
        async fn open(
            &self,
            _binding: &ConsumerBinding,
        ) -> Result<Box<dyn MessageStream>, BrokerError> {
            Err(BrokerError::Unreachable("mock broker is down".to_string()))
        }
    }

    /// Broker whose `open` sleeps for the listed callback keys before
    /// delegating (lock-contention tests)
    pub struct SlowOpenBroker {
        inner: Arc<MockBroker>,
        slow_keys: Vec<String>,
        delay: std::time::Duration,
    }

    impl SlowOpenBroker {
        pub fn new(
            inner: Arc<MockBroker>,
            slow_keys: Vec<String>,
            delay: std::time::Duration,
        ) -> Self {
            Self {
                inner,
                slow_keys,
                delay,
            }
        }
    }

    #[async_trait]
    impl BrokerConnector for SlowOpenBroker {
        async fn open(
            &self,
            binding: &ConsumerBinding,
        ) -> Result<Box<dyn MessageStream>, BrokerError> {
            if self.slow_keys.contains(&binding.callback_key) {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.open(binding).await
        }
    }

    /// Broker failing only for the listed callback keys
    pub struct PartiallyUnreachableBroker {
        inner: Arc<MockBroker>,
        failing_keys: Vec<String>,
    }

    impl PartiallyUnreachableBroker {
        pub fn new(inner: Arc<MockBroker>, failing_keys: Vec<String>) -> Self {
            Self {
                inner,
                failing_keys,
            }
        }
    }

    #[async_trait]
    impl BrokerConnector for PartiallyUnreachableBroker {
        async fn open(
            &self,
            binding: &ConsumerBinding,
        ) -> Result<Box<dyn MessageStream>, BrokerError> {
            if self.failing_keys.contains(&binding.callback_key) {
                return Err(BrokerError::Unreachable(format!(
                    "no route for {}",
                    binding.callback_key
                )));
            }
            self.inner.open(binding).await
        }
    }
}
