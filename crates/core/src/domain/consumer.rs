// Consumer Identity Model
//
// A consuming worker is keyed by (callback key, cluster). The two clusters
// are dispatched independently so a slave-cluster backlog cannot starve
// master-cluster delivery.

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Broker cluster, a fixed two-member set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Master,
    Slave,
}

impl Cluster {
    /// Every cluster a consumer must exist on when its config is enabled.
    pub const ALL: [Cluster; 2] = [Cluster::Master, Cluster::Slave];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cluster::Master => "master",
            Cluster::Slave => "slave",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "master" => Ok(Cluster::Master),
            "slave" => Ok(Cluster::Slave),
            other => Err(DomainError::UnknownCluster(other.to_string())),
        }
    }
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unique identity of a running consuming worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerIdentity {
    pub callback_key: String,
    pub cluster: Cluster,
}

impl ConsumerIdentity {
    pub fn new(callback_key: impl Into<String>, cluster: Cluster) -> Self {
        Self {
            callback_key: callback_key.into(),
            cluster,
        }
    }
}

impl std::fmt::Display for ConsumerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.callback_key, self.cluster)
    }
}

/// Everything a consuming worker is bound to on the broker side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerBinding {
    pub app_id: String,
    pub queue_code: String,
    pub callback_key: String,
    pub cluster: Cluster,
}

impl ConsumerBinding {
    pub fn identity(&self) -> ConsumerIdentity {
        ConsumerIdentity::new(self.callback_key.clone(), self.cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display_format() {
        let id = ConsumerIdentity::new("cb1", Cluster::Master);
        assert_eq!(id.to_string(), "cb1_master");
    }

    #[test]
    fn test_cluster_parse_round_trip() {
        for cluster in Cluster::ALL {
            assert_eq!(Cluster::parse(cluster.as_str()).unwrap(), cluster);
        }
        assert!(Cluster::parse("unknown").is_err());
    }
}
