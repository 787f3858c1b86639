//! The reconciliation control loop.
//!
//! Orchestrates the store, probe and proxy-admin layers through one tick at a time: prune
//! stale records, validate the master pointer, sweep node health, elect a replacement master
//! when needed, and publish routing to the proxy. Ticks never overlap and carry no state
//! across themselves beyond [`Reconciler::last_promotion`], which is always safe to read.
use std::future::Future;
use std::time::Duration;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use futures::stream::StreamExt;

use mha_context::Context;
use mha_probe::HealthOutcome;
use mha_probe::Probe;
use mha_proxyadmin::ProxyAdmin;
use mha_proxyadmin::RoutedServer;
use mha_store::TxnOutcome;
use mha_topology::NodeLookup;
use mha_topology::NodeRecord;
use mha_topology::NodeRole;
use mha_topology::NodeStatus;
use mha_topology::SlaveRecord;
use mha_topology::TopologyRepository;

mod election;
pub mod metrics;
mod observation;

#[cfg(test)]
mod tests;

pub use self::election::elect;
pub use self::observation::NodeObservation;

/// Timing and concurrency knobs the Reconciler needs, assembled from [`mha_config::Conf`] at
/// startup.
#[derive(Clone, Debug)]
pub struct ReconcilerSettings {
    pub check_interval: Duration,
    pub promotion_grace_period: Duration,
    pub max_age: Duration,
    pub probe_timeout: Duration,
    pub lag_threshold: Duration,
    pub pool_size: usize,
    pub writer_hostgroup: u16,
    pub reader_hostgroup: u16,
}

/// What a single tick accomplished, returned for tests and logging; not part of the public
/// contract any caller needs to branch on.
#[derive(Debug, Default)]
pub struct TickReport {
    pub nodes_seen: usize,
    pub nodes_pruned: usize,
    pub nodes_probed: usize,
    pub master: Option<String>,
    pub promoted: Option<String>,
}

/// The control loop. One instance runs for the lifetime of the process.
pub struct Reconciler {
    topology: TopologyRepository,
    probe: Probe,
    proxy: ProxyAdmin,
    settings: ReconcilerSettings,
    last_promotion: Option<Instant>,
    tick_id: u64,
}

impl Reconciler {
    pub fn new(
        topology: TopologyRepository,
        probe: Probe,
        proxy: ProxyAdmin,
        settings: ReconcilerSettings,
    ) -> Self {
        Reconciler {
            topology,
            probe,
            proxy,
            settings,
            last_promotion: None,
            tick_id: 0,
        }
    }

    /// Run ticks forever, sleeping `check_interval` between them, until `shutdown` resolves.
    ///
    /// A SIGTERM/SIGINT future passed as `shutdown` lets the current tick drain to completion
    /// before the loop exits; no tick is interrupted mid-flight.
    pub async fn run<S>(&mut self, context: &Context, mut shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Unpin,
    {
        loop {
            self.tick_id += 1;
            let tick_id = self.tick_id;
            let tick_context = context.derive_with(|builder| builder.tick_id(tick_id));
            match self.tick(&tick_context).await {
                Ok(report) => {
                    slog::debug!(
                        context.logger, "Tick completed";
                        "nodes_seen" => report.nodes_seen,
                        "nodes_pruned" => report.nodes_pruned,
                        "nodes_probed" => report.nodes_probed,
                    );
                }
                Err(error) => {
                    slog::warn!(context.logger, "Tick abandoned"; "error" => %error);
                }
            }

            tokio::select! {
                _ = &mut shutdown => {
                    slog::info!(context.logger, "Shutdown signal received, exiting after current tick");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.settings.check_interval) => {}
            }
        }
    }

    /// Run exactly one tick, bounded by `check_interval` as its overall deadline.
    pub async fn tick(&mut self, context: &Context) -> Result<TickReport> {
        metrics::TICK_COUNT.inc();
        let timer = metrics::TICK_DURATION.start_timer();
        let result = tokio::time::timeout(self.settings.check_interval, self.tick_inner(context)).await;
        timer.observe_duration();
        match result {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(error)) => {
                metrics::TICK_ABANDONED.inc();
                Err(error)
            }
            Err(_) => {
                metrics::TICK_ABANDONED.inc();
                slog::warn!(context.logger, "Tick exceeded its deadline and was abandoned");
                Ok(TickReport::default())
            }
        }
    }

    async fn tick_inner(&mut self, context: &Context) -> Result<TickReport> {
        let mut report = TickReport::default();

        // S1 -- Snapshot.
        let nodes = self.topology.list_nodes(context).await?;
        report.nodes_seen = nodes.len();
        if nodes.is_empty() {
            return Ok(report);
        }

        // S2 -- Prune stale records.
        let remaining = self.prune_stale(context, &nodes).await?;
        report.nodes_pruned = nodes.len() - remaining.len();

        // S3 -- Validate the master key.
        self.validate_master(context).await?;

        // S4 -- Health sweep.
        let (observations, records) = self.health_sweep(context, &remaining).await?;
        report.nodes_probed = observations.len();

        // S5 -- Failover decision.
        report.promoted = self.failover_decision(context, &remaining, &observations).await?;

        // S6 -- Publish routing.
        report.master = self.publish_routing(context, &observations, &records).await?;

        Ok(report)
    }

    /// S2: delete any record whose `last_seen` is missing, stale, or unparseable.
    async fn prune_stale(&self, context: &Context, nodes: &[String]) -> Result<Vec<String>> {
        let max_age = chrono::Duration::from_std(self.settings.max_age).unwrap_or(chrono::Duration::zero());
        let now = Utc::now();
        let current_master = self.topology.get_master(context).await?;
        let mut remaining = Vec::with_capacity(nodes.len());

        for id in nodes {
            let stale = match self.topology.lookup_node(context, id).await? {
                NodeLookup::Malformed => true,
                NodeLookup::Missing => true,
                NodeLookup::Found(record) => match record.last_seen {
                    None => true,
                    Some(last_seen) => now.signed_duration_since(last_seen) > max_age,
                },
            };

            if !stale {
                remaining.push(id.clone());
                continue;
            }

            slog::info!(context.logger, "Pruning stale node record"; "node" => id);
            self.topology.delete_node(context, id).await?;
            if current_master.as_deref() == Some(id.as_str()) {
                self.topology.clear_master(context).await?;
            }
        }
        Ok(remaining)
    }

    /// S3: clear the master pointer when its referent is gone, unhealthy past the grace
    /// period, or no longer holds `role = master`.
    ///
    /// A role mismatch always clears, even within the grace period; only the
    /// status-not-online case is suppressed by it. A promotion that finished but whose
    /// target was never probed healthy is still a role match, so it survives the grace
    /// period as intended.
    async fn validate_master(&self, context: &Context) -> Result<()> {
        let master_id = match self.topology.get_master(context).await? {
            None => return Ok(()),
            Some(id) => id,
        };

        match self.topology.lookup_node(context, &master_id).await? {
            NodeLookup::Missing | NodeLookup::Malformed => {
                slog::warn!(context.logger, "Master pointer refers to an absent node"; "node" => &master_id);
                self.topology.clear_master(context).await?;
            }
            NodeLookup::Found(record) => {
                let role_mismatch = record.role != NodeRole::Master;
                let status_bad = record.status != NodeStatus::Online;
                if role_mismatch {
                    slog::warn!(context.logger, "Master pointer refers to a non-master node"; "node" => &master_id);
                    self.topology.clear_master(context).await?;
                } else if status_bad && !self.within_grace_period() {
                    slog::warn!(context.logger, "Master is not online past the grace period"; "node" => &master_id);
                    self.topology.clear_master(context).await?;
                }
            }
        }
        Ok(())
    }

    fn within_grace_period(&self) -> bool {
        match self.last_promotion {
            None => false,
            Some(at) => at.elapsed() < self.settings.promotion_grace_period,
        }
    }

    /// S4: probe every remaining node, bounded by `pool_size` concurrent in-flight probes,
    /// and write back only the nodes whose status changed.
    async fn health_sweep(
        &self,
        context: &Context,
        nodes: &[String],
    ) -> Result<(Vec<(String, NodeObservation)>, std::collections::HashMap<String, NodeRecord>)> {
        let mut records = std::collections::HashMap::new();
        let mut to_probe = Vec::new();
        for id in nodes {
            match self.topology.lookup_node(context, id).await? {
                NodeLookup::Found(record) if record.has_valid_address() => {
                    to_probe.push((id.clone(), record.clone()));
                    records.insert(id.clone(), record);
                }
                NodeLookup::Found(_) => {
                    slog::warn!(context.logger, "Node record has an invalid address, deleting"; "node" => id);
                    self.topology.delete_node(context, id).await?;
                }
                NodeLookup::Malformed => {
                    slog::warn!(context.logger, "Node record is malformed, deleting"; "node" => id);
                    self.topology.delete_node(context, id).await?;
                }
                NodeLookup::Missing => {}
            }
        }

        let cap = self.settings.pool_size.max(1).min(to_probe.len().max(1));
        let mut observations = Vec::with_capacity(to_probe.len());
        let probe_results: Vec<(String, NodeObservation, Option<NodeRecord>)> =
            futures::stream::iter(to_probe.into_iter().map(|(id, record)| self.probe_node(context, id, record)))
                .buffer_unordered(cap)
                .collect()
                .await;

        for (id, observation, updated) in probe_results {
            if let Some(updated) = updated {
                self.topology.put_node(context, &id, &updated).await?;
            }
            if let NodeRole::Slave = observation.role {
                let master = self.topology.get_master(context).await?.unwrap_or_default();
                let lag = match observation.status {
                    NodeStatus::Online => 0,
                    _ => -1,
                };
                let _ = self
                    .topology
                    .put_slave(
                        context,
                        &id,
                        &SlaveRecord {
                            master_node_id: master,
                            replication_lag: lag,
                        },
                    )
                    .await;
            }
            observations.push((id, observation));
        }

        Ok((observations, records))
    }

    /// Probe a single node and compute its status/gtid observation plus, if the status
    /// changed from the stored record, the updated record to write back.
    async fn probe_node(
        &self,
        context: &Context,
        id: String,
        record: NodeRecord,
    ) -> (String, NodeObservation, Option<NodeRecord>) {
        let health = self
            .probe
            .probe_health(context, &record.host, record.port)
            .await
            .unwrap_or(HealthOutcome::Failed(mha_probe::FailureReason::Unreachable(
                "probe call failed".to_string(),
            )));

        let (status, gtid) = match health {
            HealthOutcome::Failed(reason) => {
                slog::debug!(
                    context.logger, "Node probe failed";
                    "node" => &id, "reason" => %reason,
                );
                metrics::PROBE_FAILED.inc();
                (NodeStatus::Failed, record.gtid_position.clone())
            }
            HealthOutcome::Online if record.role == NodeRole::Slave => {
                let replication = self
                    .probe
                    .probe_replication(context, &record.host, record.port)
                    .await
                    .unwrap_or_default();
                if replication.is_healthy(self.settings.lag_threshold) {
                    (NodeStatus::Online, replication.gtid)
                } else {
                    metrics::PROBE_FAILED.inc();
                    (NodeStatus::Failed, replication.gtid)
                }
            }
            HealthOutcome::Online => {
                let gtid = self
                    .probe
                    .probe_write_position(context, &record.host, record.port)
                    .await
                    .unwrap_or_default();
                (NodeStatus::Online, gtid)
            }
        };

        let observation = NodeObservation {
            host: record.host.clone(),
            port: record.port,
            role: record.role,
            status,
            gtid_position: gtid.clone(),
        };

        let updated = if status != record.status {
            let mut next = record.clone();
            next.status = status;
            next.last_seen = Some(Utc::now());
            next.gtid_position = gtid;
            Some(next)
        } else {
            None
        };

        (id, observation, updated)
    }

    /// S5: elect and promote a replacement master if the current one is absent or unhealthy.
    async fn failover_decision(
        &mut self,
        context: &Context,
        nodes: &[String],
        observations: &[(String, NodeObservation)],
    ) -> Result<Option<String>> {
        let current_master = self.topology.get_master(context).await?;
        if let Some(master_id) = &current_master {
            if observations
                .iter()
                .any(|(id, observation)| id == master_id && observation.is_online())
            {
                return Ok(None);
            }
        }

        let candidates: Vec<(String, NodeObservation)> = observations
            .iter()
            .filter(|(_, observation)| observation.is_online_slave())
            .cloned()
            .collect();

        let winner = match elect(&candidates) {
            None => {
                slog::info!(context.logger, "No promotable candidate found this tick");
                return Ok(None);
            }
            Some((id, _)) => id.clone(),
        };

        let outcome = self
            .topology
            .set_master_cas(context, current_master.as_deref(), &winner)
            .await?;
        match outcome {
            TxnOutcome::Failure => {
                metrics::CAS_CONFLICTS.inc();
                slog::info!(context.logger, "Lost the promotion race this tick"; "candidate" => &winner);
                Ok(None)
            }
            TxnOutcome::Success => {
                metrics::PROMOTIONS.inc();
                slog::info!(context.logger, "Promoted new master"; "node" => &winner);
                self.last_promotion = Some(Instant::now());
                let others: Vec<String> = nodes.iter().filter(|id| **id != winner).cloned().collect();
                self.topology.set_roles(context, &winner, &others).await?;
                Ok(Some(winner))
            }
        }
    }

    /// S6: publish the writer/reader routing groups to the proxy from this tick's freshest
    /// observations, not from the store (which may lag behind what S4/S5 just learned).
    async fn publish_routing(
        &self,
        context: &Context,
        observations: &[(String, NodeObservation)],
        records: &std::collections::HashMap<String, NodeRecord>,
    ) -> Result<Option<String>> {
        let master_id = self.topology.get_master(context).await?;
        let master_id = match master_id {
            None => {
                self.proxy.publish_empty(context).await?;
                return Ok(None);
            }
            Some(id) => id,
        };

        let master_server = observations
            .iter()
            .find(|(id, _)| *id == master_id)
            .map(|(_, observation)| RoutedServer::new(observation.host.clone(), normalise_port(observation.port)))
            .or_else(|| {
                records
                    .get(&master_id)
                    .map(|record| RoutedServer::new(record.host.clone(), normalise_port(record.port)))
            });

        let master_server = match master_server {
            Some(server) => server,
            None => {
                // The master pointer is valid but we have no observation for it (raced with
                // pruning). Treat as absent rather than publish a server we never probed.
                self.proxy.publish_empty(context).await?;
                return Ok(None);
            }
        };

        let slaves: Vec<RoutedServer> = observations
            .iter()
            .filter(|(id, observation)| *id != master_id && observation.is_online_slave())
            .map(|(_, observation)| RoutedServer::new(observation.host.clone(), normalise_port(observation.port)))
            .collect();

        self.proxy
            .publish_routing(context, master_server, slaves)
            .await?;
        Ok(Some(master_id))
    }
}

fn normalise_port(port: u16) -> u16 {
    if port == 0 {
        mha_proxyadmin::DEFAULT_MYSQL_PORT
    } else {
        port
    }
}
