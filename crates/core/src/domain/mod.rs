// Domain Layer - Configuration snapshots, consumer identity, messages

pub mod config;
pub mod consumer;
pub mod error;
pub mod message;
pub mod outcome;

// Re-exports
pub use config::{AppConfig, CallbackConfig, DispatchGroups, QueueConfig};
pub use consumer::{Cluster, ConsumerBinding, ConsumerIdentity};
pub use error::DomainError;
pub use message::Message;
pub use outcome::{DispatchOutcome, OutcomeKind};
