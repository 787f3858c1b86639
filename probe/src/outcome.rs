//! Data returned by a node probe.
use std::time::Duration;

/// Why a probe classified a node as unreachable.
///
/// Mirrors the error taxonomy's probe-related kinds, but as data rather than as an error:
/// the spec requires `ProbeHealth` to never fail the tick, only to classify the node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FailureReason {
    /// The connection or query did not complete within the per-probe deadline.
    Timeout,

    /// The server rejected the replication-user credentials.
    Auth,

    /// The connection could not be established at all (DNS, refused, reset, ...).
    Unreachable(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "connection timed out"),
            FailureReason::Auth => write!(f, "authentication rejected"),
            FailureReason::Unreachable(detail) => write!(f, "unreachable: {}", detail),
        }
    }
}

/// Result of [`Probe::probe_health`](crate::Probe::probe_health).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HealthOutcome {
    Online,
    Failed(FailureReason),
}

impl HealthOutcome {
    pub fn is_online(&self) -> bool {
        matches!(self, HealthOutcome::Online)
    }
}

/// Result of [`Probe::probe_replication`](crate::Probe::probe_replication).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReplicationStatus {
    pub io_running: bool,
    pub sql_running: bool,
    pub lag: Option<Duration>,
    pub gtid: String,
}

impl ReplicationStatus {
    /// A replica is unhealthy if either thread is stopped or lag exceeds `threshold`.
    ///
    /// An unknown (`None`) lag is treated conservatively as unhealthy, since the coordinator
    /// cannot tell whether the replica is caught up.
    pub fn is_healthy(&self, threshold: Duration) -> bool {
        self.io_running
            && self.sql_running
            && matches!(self.lag, Some(lag) if lag <= threshold)
    }
}
