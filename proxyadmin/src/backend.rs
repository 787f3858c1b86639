//! Backend interface implemented by proxy admin transports.
use anyhow::Result;

use mha_context::Context;

use crate::server::RoutedServer;

/// Interface implemented by concrete proxy admin transports.
///
/// Enables swapping the real administrative SQL session for a recording fake in tests, the
/// same way [`mha_store::StoreBackend`](../../mha_store/trait.StoreBackend.html) decouples the
/// control loop from the consensus store transport.
#[async_trait::async_trait]
pub trait ProxyAdminBackend: Send + Sync {
    /// One-time startup configuration: monitoring credentials, probe intervals, connection
    /// cap, and the writer/reader query rules.
    async fn initialize(&self, context: &Context) -> Result<()>;

    /// Clear both routing groups. Used when no master exists.
    async fn publish_empty(&self, context: &Context) -> Result<()>;

    /// Replace the writer group with exactly `master` and the reader group with exactly
    /// `slaves`, then commit to runtime and persist to disk.
    async fn publish_routing(
        &self,
        context: &Context,
        master: RoutedServer,
        slaves: Vec<RoutedServer>,
    ) -> Result<()>;
}
