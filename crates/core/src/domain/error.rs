// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("App not found: {0}")]
    AppNotFound(String),

    #[error("Queue not found: {app_id}/{queue_code}")]
    QueueNotFound { app_id: String, queue_code: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
