//! Scripted fake [`ProbeBackend`] for unit tests.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;

use mha_context::Context;

use crate::backend::ProbeBackend;
use crate::outcome::HealthOutcome;
use crate::outcome::ReplicationStatus;

/// Scripted responses keyed by `host:port`, so tests can drive a multi-node tick without a
/// real MySQL server.
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    health: Arc<Mutex<HashMap<String, HealthOutcome>>>,
    replication: Arc<Mutex<HashMap<String, ReplicationStatus>>>,
    write_position: Arc<Mutex<HashMap<String, String>>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(host: &str, port: u16) -> String {
        format!("{}:{}", host, port)
    }

    pub fn set_health(&self, host: &str, port: u16, outcome: HealthOutcome) {
        self.health.lock().unwrap().insert(Self::key(host, port), outcome);
    }

    pub fn set_replication(&self, host: &str, port: u16, status: ReplicationStatus) {
        self.replication
            .lock()
            .unwrap()
            .insert(Self::key(host, port), status);
    }

    pub fn set_write_position(&self, host: &str, port: u16, gtid: &str) {
        self.write_position
            .lock()
            .unwrap()
            .insert(Self::key(host, port), gtid.to_string());
    }
}

#[async_trait::async_trait]
impl ProbeBackend for ScriptedProbe {
    async fn probe_health(&self, _: &Context, host: &str, port: u16) -> Result<HealthOutcome> {
        let key = Self::key(host, port);
        Ok(self
            .health
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or(HealthOutcome::Failed(crate::outcome::FailureReason::Unreachable(
                "no scripted response".to_string(),
            ))))
    }

    async fn probe_replication(&self, _: &Context, host: &str, port: u16) -> Result<ReplicationStatus> {
        let key = Self::key(host, port);
        Ok(self
            .replication
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn probe_write_position(&self, _: &Context, host: &str, port: u16) -> Result<String> {
        let key = Self::key(host, port);
        Ok(self
            .write_position
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}
