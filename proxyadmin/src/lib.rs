//! Typed wrapper over the proxy's administrative SQL surface.
use anyhow::Result;

use mha_context::Context;

mod backend;
mod server;
mod sqladmin;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::PublishedRouting;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::RecordingProxyAdmin;

pub use self::backend::ProxyAdminBackend;
pub use self::server::RoutedServer;
pub use self::server::DEFAULT_MYSQL_PORT;
pub use self::sqladmin::SqlProxyAdmin;

/// Facade over a [`ProxyAdminBackend`], the proxy-side analogue of
/// [`mha_store::Store`](../mha_store/struct.Store.html).
pub struct ProxyAdmin {
    backend: Box<dyn ProxyAdminBackend>,
}

impl ProxyAdmin {
    pub async fn initialize(&self, context: &Context) -> Result<()> {
        self.backend.initialize(context).await
    }

    pub async fn publish_empty(&self, context: &Context) -> Result<()> {
        self.backend.publish_empty(context).await
    }

    pub async fn publish_routing(
        &self,
        context: &Context,
        master: RoutedServer,
        slaves: Vec<RoutedServer>,
    ) -> Result<()> {
        self.backend.publish_routing(context, master, slaves).await
    }
}

impl<T> From<T> for ProxyAdmin
where
    T: ProxyAdminBackend + 'static,
{
    fn from(value: T) -> Self {
        ProxyAdmin {
            backend: Box::new(value),
        }
    }
}
