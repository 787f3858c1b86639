//! Data object storing the coordinator's process-wide configuration.
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Endpoint and credentials for the consensus store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConf {
    /// Endpoint URLs for the consensus store cluster.
    pub endpoints: Vec<String>,

    /// Username used to authenticate with the consensus store.
    pub user: String,

    /// Password used to authenticate with the consensus store.
    pub password: String,

    /// Key prefix all coordinator keys are scoped under.
    pub namespace: String,
}

/// Credentials used to open short-lived probe connections to database nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConf {
    pub username: String,
    pub password: String,

    /// Hard per-probe connection/query deadline.
    pub timeout: Duration,

    /// Replication lag above which a replica is considered unhealthy.
    pub lag_threshold: Duration,

    /// Upper bound on concurrently in-flight probes during a health sweep.
    pub pool_size: usize,
}

/// Connection and credentials for the proxy's administration interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConf {
    pub admin_host: String,
    pub admin_port: u16,
    pub admin_user: String,
    pub admin_password: String,
    pub writer_hostgroup: u16,
    pub reader_hostgroup: u16,
}

/// Timing knobs for the reconciliation loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConf {
    /// Period between the end of one tick and the start of the next.
    pub check_interval: Duration,

    /// Suppress master-pointer re-validation for this long after a promotion.
    pub promotion_grace_period: Duration,

    /// Node records older than this are considered stale and pruned.
    pub max_age: Duration,
}

/// Global configuration for the coordinator process, assembled from the environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conf {
    pub store: StoreConf,
    pub probe: ProbeConf,
    pub proxy: ProxyConf,
    pub reconciler: ReconcilerConf,
}
