//! Recording fake [`ProxyAdminBackend`] for unit tests.
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;

use mha_context::Context;

use crate::backend::ProxyAdminBackend;
use crate::server::RoutedServer;

/// What the last publish call recorded, so tests can assert on routing-faithfulness without a
/// real ProxySQL instance.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PublishedRouting {
    pub master: Option<RoutedServer>,
    pub slaves: Vec<RoutedServer>,
}

/// Records every publish call it receives; never talks to a real proxy.
///
/// Shares its state behind `Arc`, so a cloned handle still observes calls made through the
/// [`ProxyAdmin`](crate::ProxyAdmin) facade built from another clone.
#[derive(Clone, Default)]
pub struct RecordingProxyAdmin {
    initialized: Arc<Mutex<bool>>,
    last_publish: Arc<Mutex<Option<PublishedRouting>>>,
    publish_count: Arc<Mutex<u64>>,
}

impl RecordingProxyAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_initialized(&self) -> bool {
        *self.initialized.lock().unwrap()
    }

    pub fn last_publish(&self) -> Option<PublishedRouting> {
        self.last_publish.lock().unwrap().clone()
    }

    pub fn publish_count(&self) -> u64 {
        *self.publish_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ProxyAdminBackend for RecordingProxyAdmin {
    async fn initialize(&self, _: &Context) -> Result<()> {
        *self.initialized.lock().unwrap() = true;
        Ok(())
    }

    async fn publish_empty(&self, _: &Context) -> Result<()> {
        *self.last_publish.lock().unwrap() = Some(PublishedRouting::default());
        *self.publish_count.lock().unwrap() += 1;
        Ok(())
    }

    async fn publish_routing(
        &self,
        _: &Context,
        master: RoutedServer,
        slaves: Vec<RoutedServer>,
    ) -> Result<()> {
        *self.last_publish.lock().unwrap() = Some(PublishedRouting {
            master: Some(master),
            slaves,
        });
        *self.publish_count.lock().unwrap() += 1;
        Ok(())
    }
}
