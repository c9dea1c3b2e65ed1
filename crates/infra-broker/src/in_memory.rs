// In-Memory Broker
//
// One bounded queue per (app, queue, cluster). Consumers opened against the
// same queue compete for deliveries, which matches the competing-consumer
// semantics of the real clustered broker closely enough for local runs and
// integration tests. Acknowledgement is implicit: a received message is
// consumed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use hookbridge_core::domain::{Cluster, ConsumerBinding, Message};
use hookbridge_core::port::{BrokerConnector, BrokerError, MessagePublisher, MessageStream};

/// Per-queue buffer size before publishes are rejected
const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueueKey {
    app_id: String,
    queue_code: String,
    cluster: Cluster,
}

struct QueueChannel {
    tx: mpsc::Sender<Message>,
    rx: Arc<Mutex<mpsc::Receiver<Message>>>,
}

pub struct InMemoryBroker {
    queues: RwLock<HashMap<QueueKey, QueueChannel>>,
}

impl InMemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queues: RwLock::new(HashMap::new()),
        })
    }

    async fn channel(&self, key: QueueKey) -> QueueChannel {
        {
            let queues = self.queues.read().await;
            if let Some(channel) = queues.get(&key) {
                return QueueChannel {
                    tx: channel.tx.clone(),
                    rx: Arc::clone(&channel.rx),
                };
            }
        }

        let mut queues = self.queues.write().await;
        // Re-check under the write lock; another caller may have created it.
        let channel = queues.entry(key).or_insert_with(|| {
            let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
            QueueChannel {
                tx,
                rx: Arc::new(Mutex::new(rx)),
            }
        });
        QueueChannel {
            tx: channel.tx.clone(),
            rx: Arc::clone(&channel.rx),
        }
    }
}

/// Competing-consumer stream over the shared receiver
struct SharedStream {
    rx: Arc<Mutex<mpsc::Receiver<Message>>>,
}

#[async_trait]
impl MessageStream for SharedStream {
    async fn next(&mut self) -> Option<Message> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

#[async_trait]
impl BrokerConnector for InMemoryBroker {
    async fn open(&self, binding: &ConsumerBinding) -> Result<Box<dyn MessageStream>, BrokerError> {
        let channel = self
            .channel(QueueKey {
                app_id: binding.app_id.clone(),
                queue_code: binding.queue_code.clone(),
                cluster: binding.cluster,
            })
            .await;

        debug!(
            app_id = %binding.app_id,
            queue_code = %binding.queue_code,
            cluster = %binding.cluster,
            callback_key = %binding.callback_key,
            "Opened in-memory consumer stream"
        );
        Ok(Box::new(SharedStream { rx: channel.rx }))
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(&self, cluster: Cluster, message: Message) -> Result<(), BrokerError> {
        let key = QueueKey {
            app_id: message.app_id.clone(),
            queue_code: message.queue_code.clone(),
            cluster,
        };
        let queue_name = format!("{}/{}/{}", key.app_id, key.queue_code, key.cluster);
        let channel = self.channel(key).await;

        channel
            .tx
            .try_send(message)
            .map_err(|_| BrokerError::QueueFull(queue_name))
    }
}
