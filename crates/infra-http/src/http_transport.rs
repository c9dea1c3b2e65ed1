// HTTP Webhook Transport
//
// One POST per (message, subscriber): payload as JSON body, per-call timeout
// covering both connection and response wait (subscriber override or the
// transport default), success-range status = delivery success.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use hookbridge_core::domain::{CallbackConfig, Message};
use hookbridge_core::port::{DeliveryError, WebhookTransport};

pub struct HttpWebhookTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpWebhookTransport {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_timeout,
        }
    }

    fn call_timeout(&self, callback: &CallbackConfig) -> Duration {
        callback
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn deliver(
        &self,
        message: &Message,
        callback: &CallbackConfig,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&callback.url)
            .timeout(self.call_timeout(callback))
            .header("Content-Type", "application/json")
            .body(message.payload.to_string())
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    debug!(
                        message_id = %message.id,
                        callback_key = %callback.callback_key,
                        status = %status,
                        "Webhook accepted"
                    );
                    Ok(())
                } else {
                    Err(DeliveryError::Status(status.as_u16()))
                }
            }
            Err(err) => {
                if err.is_timeout() {
                    Err(DeliveryError::Timeout)
                } else {
                    Err(DeliveryError::Network(err.to_string()))
                }
            }
        }
    }
}
