// Configuration Snapshot Model
//
// One AppConfig per publishing application, replaced wholesale on every
// reload. The core treats these as read-only snapshots: the reconciler and
// dispatch engine never mutate them.

use serde::{Deserialize, Serialize};

/// One subscriber of a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Unique identifier of the subscriber within the queue
    pub callback_key: String,
    /// Webhook URL receiving the message payload
    pub url: String,
    /// Subscriber-level enable flag
    pub enable: bool,
    /// Per-call delivery timeout override (ms)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// One logical queue within an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue code, unique within the application
    pub code: String,
    /// Queue-level enable flag. A disabled queue has zero running
    /// consumers regardless of its callbacks' own flags.
    pub enable: bool,
    #[serde(default)]
    pub callbacks: Vec<CallbackConfig>,
}

/// One publishing application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_id: String,
    /// Partitioning label used to shard reconciliation responsibility
    /// across bridge instances
    #[serde(default)]
    pub dispatch_group: String,
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

impl QueueConfig {
    /// Desired-run predicate for one callback of this queue.
    pub fn wants_consumer(&self, callback: &CallbackConfig) -> bool {
        self.enable && callback.enable
    }
}

/// The dispatch groups this bridge instance is responsible for.
///
/// An empty set matches every group, so a single-instance deployment
/// needs no group assignment at all.
#[derive(Debug, Clone, Default)]
pub struct DispatchGroups {
    groups: Vec<String>,
}

impl DispatchGroups {
    pub fn new(groups: Vec<String>) -> Self {
        Self { groups }
    }

    /// Parse a comma-separated group list ("" = match all)
    pub fn parse(raw: &str) -> Self {
        let groups = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Self { groups }
    }

    pub fn matches(&self, dispatch_group: &str) -> bool {
        self.groups.is_empty() || self.groups.iter().any(|g| g == dispatch_group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback(enable: bool) -> CallbackConfig {
        CallbackConfig {
            callback_key: "cb1".to_string(),
            url: "http://localhost/hook".to_string(),
            enable,
            timeout_ms: None,
        }
    }

    #[test]
    fn test_queue_disable_overrides_callback_enable() {
        let queue = QueueConfig {
            code: "orders".to_string(),
            enable: false,
            callbacks: vec![],
        };
        assert!(!queue.wants_consumer(&callback(true)));
    }

    #[test]
    fn test_wants_consumer_requires_both_flags() {
        let queue = QueueConfig {
            code: "orders".to_string(),
            enable: true,
            callbacks: vec![],
        };
        assert!(queue.wants_consumer(&callback(true)));
        assert!(!queue.wants_consumer(&callback(false)));
    }

    #[test]
    fn test_empty_dispatch_groups_match_all() {
        let groups = DispatchGroups::parse("");
        assert!(groups.matches("any"));
        assert!(groups.matches(""));
    }

    #[test]
    fn test_dispatch_groups_filter() {
        let groups = DispatchGroups::parse("g1, g2");
        assert!(groups.matches("g1"));
        assert!(groups.matches("g2"));
        assert!(!groups.matches("g3"));
    }

    #[test]
    fn test_app_config_deserializes_with_defaults() {
        let raw = r#"{"app_id": "A", "queues": [{"code": "orders", "enable": true}]}"#;
        let app: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(app.dispatch_group, "");
        assert_eq!(app.queues.len(), 1);
        assert!(app.queues[0].callbacks.is_empty());
    }
}
