// Callback Dispatch Engine
//
// Fans a consumed message out to every enabled subscriber of its
// (app, queue), one spawned delivery per subscriber, gated by the shared
// adjustable semaphore. Subscriber deliveries are independent: one
// subscriber's failure or slowness never blocks or fails another's, and
// dispatch returns without awaiting deliveries so a slow subscriber cannot
// stall intake from the broker.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::application::semaphore::AdjustableSemaphore;
use crate::domain::{CallbackConfig, DispatchOutcome, Message, OutcomeKind};
use crate::error::Result;
use crate::port::{ConfigService, DeliveryError, OutcomeStore, TimeProvider, WebhookTransport};

/// Dispatch engine settings
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Bounded wait for a permit; None waits without limit
    pub acquire_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: None,
        }
    }
}

pub struct DispatchService {
    config_service: Arc<dyn ConfigService>,
    transport: Arc<dyn WebhookTransport>,
    outcomes: Arc<dyn OutcomeStore>,
    semaphore: Arc<AdjustableSemaphore>,
    time_provider: Arc<dyn TimeProvider>,
    config: DispatchConfig,
}

impl DispatchService {
    pub fn new(
        config_service: Arc<dyn ConfigService>,
        transport: Arc<dyn WebhookTransport>,
        outcomes: Arc<dyn OutcomeStore>,
        semaphore: Arc<AdjustableSemaphore>,
        time_provider: Arc<dyn TimeProvider>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            config_service,
            transport,
            outcomes,
            semaphore,
            time_provider,
            config,
        }
    }

    /// The shared concurrency gate, exposed for capacity adjustment and stats
    pub fn semaphore(&self) -> &Arc<AdjustableSemaphore> {
        &self.semaphore
    }

    /// Fan the message out to all currently-enabled subscribers.
    ///
    /// Returns the number of deliveries spawned. An empty subscriber list is
    /// a configuration/data condition, not a fault: the message is logged as
    /// unroutable and `Ok(0)` is returned. Completion of the individual
    /// deliveries is observable through the outcome store.
    pub async fn dispatch(&self, message: Message) -> Result<usize> {
        let subscribers: Vec<CallbackConfig> = self
            .config_service
            .callback_configs(&message.app_id, &message.queue_code)
            .await?
            .into_iter()
            .filter(|cb| cb.enable)
            .collect();

        if subscribers.is_empty() {
            warn!(
                app_id = %message.app_id,
                queue_code = %message.queue_code,
                message_id = %message.id,
                "No subscribers configured, message is unroutable"
            );
            return Ok(0);
        }

        let spawned = subscribers.len();
        let message = Arc::new(message);

        for callback in subscribers {
            let message = Arc::clone(&message);
            let transport = Arc::clone(&self.transport);
            let outcomes = Arc::clone(&self.outcomes);
            let semaphore = Arc::clone(&self.semaphore);
            let time_provider = Arc::clone(&self.time_provider);
            let acquire_timeout = self.config.acquire_timeout;

            tokio::spawn(async move {
                deliver_one(
                    message,
                    callback,
                    transport,
                    outcomes,
                    semaphore,
                    time_provider,
                    acquire_timeout,
                )
                .await;
            });
        }

        debug!(
            message_id = %message.id,
            subscribers = spawned,
            "Dispatch fan-out spawned"
        );
        Ok(spawned)
    }
}

/// One independent subscriber delivery: admission, invocation, outcome.
/// The permit guard drops on every exit path.
async fn deliver_one(
    message: Arc<Message>,
    callback: CallbackConfig,
    transport: Arc<dyn WebhookTransport>,
    outcomes: Arc<dyn OutcomeStore>,
    semaphore: Arc<AdjustableSemaphore>,
    time_provider: Arc<dyn TimeProvider>,
    acquire_timeout: Option<Duration>,
) {
    let _permit = match acquire_timeout {
        None => semaphore.acquire().await,
        Some(timeout) => match semaphore.try_acquire(timeout).await {
            Some(permit) => permit,
            None => {
                // Admission-control rejection, distinct from delivery failure.
                outcomes
                    .record(outcome(
                        &message,
                        &callback,
                        OutcomeKind::AdmissionRejected,
                        time_provider.as_ref(),
                    ))
                    .await;
                return;
            }
        },
    };

    let kind = match transport.deliver(&message, &callback).await {
        Ok(()) => OutcomeKind::Delivered,
        Err(err) => OutcomeKind::DeliveryFailed(delivery_failure_reason(&err)),
    };

    outcomes
        .record(outcome(&message, &callback, kind, time_provider.as_ref()))
        .await;
}

fn delivery_failure_reason(err: &DeliveryError) -> String {
    match err {
        DeliveryError::Timeout => "timeout".to_string(),
        DeliveryError::Status(status) => format!("status:{status}"),
        DeliveryError::Network(detail) => format!("network:{detail}"),
    }
}

fn outcome(
    message: &Message,
    callback: &CallbackConfig,
    kind: OutcomeKind,
    time_provider: &dyn TimeProvider,
) -> DispatchOutcome {
    DispatchOutcome {
        message_id: message.id.clone(),
        app_id: message.app_id.clone(),
        queue_code: message.queue_code.clone(),
        callback_key: callback.callback_key.clone(),
        kind,
        recorded_at: time_provider.now_millis(),
    }
}
