// Consuming Worker - per-identity message intake loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::dispatch::DispatchService;
use crate::domain::ConsumerBinding;
use crate::port::MessageStream;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// One long-lived consuming worker: pulls messages from a single queue on a
/// single cluster and hands each one to the dispatch engine.
///
/// Failures are contained to this loop: a dispatch error is logged and the
/// loop continues after a short recovery sleep, so a broken subscriber list
/// never kills a sibling consumer.
pub struct ConsumerWorker {
    binding: ConsumerBinding,
    stream: Box<dyn MessageStream>,
    dispatcher: Arc<DispatchService>,
}

impl ConsumerWorker {
    pub fn new(
        binding: ConsumerBinding,
        stream: Box<dyn MessageStream>,
        dispatcher: Arc<DispatchService>,
    ) -> Self {
        Self {
            binding,
            stream,
            dispatcher,
        }
    }

    /// Run the intake loop until shutdown or stream end.
    pub async fn run(mut self, mut shutdown: ShutdownToken) {
        let identity = self.binding.identity();
        info!(consumer = %identity, queue = %self.binding.queue_code, "Consumer started");

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            tokio::select! {
                _ = shutdown.wait() => {
                    break;
                }
                message = self.stream.next() => {
                    match message {
                        Some(message) => {
                            if let Err(e) = self.dispatcher.dispatch(message).await {
                                error!(consumer = %identity, error = %e, "Dispatch error");
                                tokio::select! {
                                    _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                                    _ = shutdown.wait() => break,
                                }
                            }
                        }
                        None => {
                            // Broker closed the subscription. The identity
                            // stays registered; restarting is an operator
                            // decision, not a hot-loop against a dead broker.
                            warn!(consumer = %identity, "Broker stream ended");
                            break;
                        }
                    }
                }
            }
        }

        info!(consumer = %identity, "Consumer stopped");
    }
}
