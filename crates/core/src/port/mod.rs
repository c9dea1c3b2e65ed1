// Port Layer - Interfaces for external collaborators

pub mod broker;
pub mod config_service;
pub mod id_provider; // For deterministic testing
pub mod outcome_store;
pub mod time_provider;
pub mod webhook_transport;

// Re-exports
pub use broker::{BrokerConnector, BrokerError, MessagePublisher, MessageStream};
pub use config_service::ConfigService;
pub use id_provider::{IdProvider, UuidProvider};
pub use outcome_store::{LogOutcomeStore, OutcomeStore};
pub use time_provider::{SystemTimeProvider, TimeProvider};
pub use webhook_transport::{DeliveryError, WebhookTransport};
