// Hookbridge Infrastructure - Outbound Webhook Transport
// Implements: WebhookTransport

pub mod http_transport;

pub use http_transport::HttpWebhookTransport;
