//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use crate::facade::FacadeRequest;
use serde::{Deserialize, Serialize};

fn default_cluster() -> String {
    "master".to_string()
}

/// bridge.publish.v1 - Publish a message to a queue
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub app_id: String,
    pub queue_code: String,
    #[serde(default = "default_cluster")]
    pub cluster: String,
    pub payload: serde_json::Value,
}

impl FacadeRequest for PublishRequest {
    fn validate(&self) -> Result<(), String> {
        if self.app_id.is_empty() {
            return Err("appId not provided".to_string());
        }
        if self.queue_code.is_empty() {
            return Err("queueCode not provided".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse {
    pub message_id: String,
    pub app_id: String,
    pub queue_code: String,
    pub cluster: String,
}

/// bridge.consumers.v1 - List running consumers
#[derive(Debug, Deserialize)]
pub struct ConsumersRequest {
    // No parameters needed
}

impl FacadeRequest for ConsumersRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumerInfo {
    pub callback_key: String,
    pub cluster: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumersResponse {
    pub consumers: Vec<ConsumerInfo>,
}

/// bridge.reload.v1 - Force a reconciliation pass
#[derive(Debug, Deserialize)]
pub struct ReloadRequest {
    // No parameters needed
}

impl FacadeRequest for ReloadRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub started: usize,
    pub stopped: usize,
    pub failed: usize,
    pub running: usize,
}

/// bridge.setConcurrency.v1 - Resize the dispatch concurrency gate
#[derive(Debug, Deserialize)]
pub struct SetConcurrencyRequest {
    pub capacity: usize,
}

impl FacadeRequest for SetConcurrencyRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct SetConcurrencyResponse {
    pub capacity: usize,
    pub available: usize,
}

/// bridge.stats.v1 - Get bridge statistics
#[derive(Debug, Deserialize)]
pub struct StatsRequest {
    // No parameters needed
}

impl FacadeRequest for StatsRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub running_consumers: usize,
    pub dispatch_capacity: usize,
    pub dispatch_available: usize,
    pub uptime_seconds: u64,
}
