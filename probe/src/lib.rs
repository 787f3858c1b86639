//! Short-lived SQL probes of database node reachability and replication status.
use anyhow::Result;

use mha_context::Context;

mod backend;
mod gtid;
mod mysql;
mod outcome;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::ScriptedProbe;

pub use self::backend::ProbeBackend;
pub use self::gtid::compare_gtid;
pub use self::gtid::GtidOrder;
pub use self::mysql::MysqlProbe;
pub use self::outcome::FailureReason;
pub use self::outcome::HealthOutcome;
pub use self::outcome::ReplicationStatus;

/// Facade over a [`ProbeBackend`], the probe-side analogue of
/// [`mha_store::Store`](../mha_store/struct.Store.html).
pub struct Probe {
    backend: Box<dyn ProbeBackend>,
}

impl Probe {
    /// Test basic reachability of a node.
    pub async fn probe_health(&self, context: &Context, host: &str, port: u16) -> Result<HealthOutcome> {
        self.backend.probe_health(context, host, port).await
    }

    /// Read a node's replication status.
    pub async fn probe_replication(
        &self,
        context: &Context,
        host: &str,
        port: u16,
    ) -> Result<ReplicationStatus> {
        self.backend.probe_replication(context, host, port).await
    }

    /// Read a node's current write position (its own executed GTID set).
    pub async fn probe_write_position(&self, context: &Context, host: &str, port: u16) -> Result<String> {
        self.backend.probe_write_position(context, host, port).await
    }
}

impl<T> From<T> for Probe
where
    T: ProbeBackend + 'static,
{
    fn from(value: T) -> Self {
        Probe {
            backend: Box::new(value),
        }
    }
}
