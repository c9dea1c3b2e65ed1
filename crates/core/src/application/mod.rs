// Application Layer - Reconciliation and dispatch services

pub mod dispatch;
pub mod reconciler;
pub mod registry;
pub mod semaphore;
pub mod worker;

// Re-exports
pub use dispatch::{DispatchConfig, DispatchService};
pub use reconciler::{ReconcileStats, Reconciler};
pub use registry::ConsumerRegistry;
pub use semaphore::{AdjustableSemaphore, Permit};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken};
