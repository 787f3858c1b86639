//! Backend interface implemented by probe transports.
use anyhow::Result;

use mha_context::Context;

use crate::outcome::HealthOutcome;
use crate::outcome::ReplicationStatus;

/// Interface implemented by concrete probe transports.
///
/// Enables swapping the real SQL-based probe for a scripted fake in tests, the same way
/// [`mha_store::StoreBackend`](../../mha_store/trait.StoreBackend.html) decouples the
/// control loop from the consensus store transport.
#[async_trait::async_trait]
pub trait ProbeBackend: Send + Sync {
    /// Open a short-lived session and test basic reachability.
    async fn probe_health(&self, context: &Context, host: &str, port: u16) -> Result<HealthOutcome>;

    /// Open a short-lived session and read replication status.
    async fn probe_replication(
        &self,
        context: &Context,
        host: &str,
        port: u16,
    ) -> Result<ReplicationStatus>;

    /// Open a short-lived session and read the server's current write position.
    ///
    /// Used to refresh a master's own `gtid_position`, since `SHOW REPLICA STATUS` is empty
    /// on a node that is not replicating from anything.
    async fn probe_write_position(&self, context: &Context, host: &str, port: u16) -> Result<String>;
}
