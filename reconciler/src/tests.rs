use std::time::Duration;

use chrono::Utc;

use mha_context::Context;
use mha_probe::HealthOutcome;
use mha_probe::Probe;
use mha_probe::ScriptedProbe;
use mha_proxyadmin::ProxyAdmin;
use mha_proxyadmin::RecordingProxyAdmin;
use mha_store::Store;
use mha_topology::NodeRecord;
use mha_topology::NodeRole;
use mha_topology::NodeStatus;
use mha_topology::TopologyRepository;

use crate::Reconciler;
use crate::ReconcilerSettings;

fn settings() -> ReconcilerSettings {
    ReconcilerSettings {
        check_interval: Duration::from_secs(5),
        promotion_grace_period: Duration::from_secs(30),
        max_age: Duration::from_secs(300),
        probe_timeout: Duration::from_secs(3),
        lag_threshold: Duration::from_secs(300),
        pool_size: 16,
        writer_hostgroup: 10,
        reader_hostgroup: 20,
    }
}

fn node(host: &str, port: u16, role: NodeRole, status: NodeStatus) -> NodeRecord {
    NodeRecord {
        host: host.to_string(),
        port,
        role,
        status,
        last_seen: Some(Utc::now()),
        gtid_position: String::new(),
        extra: Default::default(),
    }
}

struct Harness {
    reconciler: Reconciler,
    topology: TopologyRepository,
    probe: ScriptedProbe,
    proxy: RecordingProxyAdmin,
    context: Context,
}

fn harness() -> Harness {
    let store = Store::fixture();
    let topology = TopologyRepository::new(store);
    let probe = ScriptedProbe::new();
    let proxy = RecordingProxyAdmin::new();
    let reconciler = Reconciler::new(
        topology.clone(),
        Probe::from(probe.clone()),
        ProxyAdmin::from(proxy.clone()),
        settings(),
    );
    Harness {
        reconciler,
        topology,
        probe,
        proxy,
        context: Context::fixture(),
    }
}

#[tokio::test]
async fn s_fresh_empty_store_sleeps() {
    let mut harness = harness();
    let report = harness.reconciler.tick(&harness.context).await.unwrap();
    assert_eq!(report.nodes_seen, 0);
    assert_eq!(harness.proxy.publish_count(), 0);
}

#[tokio::test]
async fn s_register_one_then_two_with_manual_promotion() {
    let mut harness = harness();
    harness
        .topology
        .put_node(&harness.context, "a", &node("10.0.0.1", 3306, NodeRole::None, NodeStatus::Unknown))
        .await
        .unwrap();
    harness.probe.set_health("10.0.0.1", 3306, HealthOutcome::Online);

    let report = harness.reconciler.tick(&harness.context).await.unwrap();
    assert_eq!(report.nodes_probed, 1);
    assert!(report.master.is_none());
    let record = harness.topology.get_node(&harness.context, "a").await.unwrap().unwrap();
    assert_eq!(record.status, NodeStatus::Online);
    assert_eq!(harness.proxy.last_publish().unwrap().master, None);

    // Register a slave and have an operator promote `a` out of band.
    harness
        .topology
        .put_node(&harness.context, "b", &node("10.0.0.2", 3306, NodeRole::Slave, NodeStatus::Unknown))
        .await
        .unwrap();
    harness.probe.set_health("10.0.0.2", 3306, HealthOutcome::Online);
    harness.probe.set_replication(
        "10.0.0.2",
        3306,
        mha_probe::ReplicationStatus {
            io_running: true,
            sql_running: true,
            lag: Some(Duration::from_secs(0)),
            gtid: "x:1-1".to_string(),
        },
    );
    harness
        .topology
        .set_master_cas(&harness.context, None, "a")
        .await
        .unwrap();
    let mut a = harness.topology.get_node(&harness.context, "a").await.unwrap().unwrap();
    a.role = NodeRole::Master;
    harness.topology.put_node(&harness.context, "a", &a).await.unwrap();

    harness.reconciler.tick(&harness.context).await.unwrap();
    let published = harness.proxy.last_publish().unwrap();
    assert_eq!(published.master.unwrap().host, "10.0.0.1");
    assert_eq!(published.slaves.len(), 1);
    assert_eq!(published.slaves[0].host, "10.0.0.2");
}

#[tokio::test]
async fn s_failover_promotes_most_advanced_slave() {
    let mut harness = harness();
    harness
        .topology
        .put_node(&harness.context, "a", &node("10.0.0.1", 3306, NodeRole::Master, NodeStatus::Online))
        .await
        .unwrap();
    harness
        .topology
        .put_node(&harness.context, "b", &node("10.0.0.2", 3306, NodeRole::Slave, NodeStatus::Online))
        .await
        .unwrap();
    harness
        .topology
        .put_node(&harness.context, "c", &node("10.0.0.3", 3306, NodeRole::Slave, NodeStatus::Online))
        .await
        .unwrap();
    harness.topology.set_master_cas(&harness.context, None, "a").await.unwrap();

    harness.probe.set_health("10.0.0.1", 3306, HealthOutcome::Failed(mha_probe::FailureReason::Timeout));
    harness.probe.set_health("10.0.0.2", 3306, HealthOutcome::Online);
    harness.probe.set_replication(
        "10.0.0.2",
        3306,
        mha_probe::ReplicationStatus {
            io_running: true,
            sql_running: true,
            lag: Some(Duration::from_secs(1)),
            gtid: "x:1-100".to_string(),
        },
    );
    harness.probe.set_health("10.0.0.3", 3306, HealthOutcome::Online);
    harness.probe.set_replication(
        "10.0.0.3",
        3306,
        mha_probe::ReplicationStatus {
            io_running: true,
            sql_running: true,
            lag: Some(Duration::from_secs(1)),
            gtid: "x:1-120".to_string(),
        },
    );

    let report = harness.reconciler.tick(&harness.context).await.unwrap();
    assert_eq!(report.promoted.as_deref(), Some("c"));
    assert_eq!(harness.topology.get_master(&harness.context).await.unwrap().as_deref(), Some("c"));

    let published = harness.proxy.last_publish().unwrap();
    assert_eq!(published.master.unwrap().host, "10.0.0.3");
    assert_eq!(published.slaves.len(), 1);
    assert_eq!(published.slaves[0].host, "10.0.0.2");
}

#[tokio::test]
async fn s_gtid_tie_picks_lexicographically_smaller_id() {
    let mut harness = harness();
    harness
        .topology
        .put_node(&harness.context, "z", &node("10.0.0.1", 3306, NodeRole::Slave, NodeStatus::Online))
        .await
        .unwrap();
    harness
        .topology
        .put_node(&harness.context, "a", &node("10.0.0.2", 3306, NodeRole::Slave, NodeStatus::Online))
        .await
        .unwrap();
    for (host, port) in [("10.0.0.1", 3306), ("10.0.0.2", 3306)] {
        harness.probe.set_health(host, port, HealthOutcome::Online);
        harness.probe.set_replication(
            host,
            port,
            mha_probe::ReplicationStatus {
                io_running: true,
                sql_running: true,
                lag: Some(Duration::from_secs(0)),
                gtid: "x:1-50".to_string(),
            },
        );
    }

    let report = harness.reconciler.tick(&harness.context).await.unwrap();
    assert_eq!(report.promoted.as_deref(), Some("a"));
}

#[tokio::test]
async fn s_grace_suppresses_reelection_on_transient_failure() {
    let mut harness = harness();
    harness
        .topology
        .put_node(&harness.context, "a", &node("10.0.0.1", 3306, NodeRole::Master, NodeStatus::Online))
        .await
        .unwrap();
    harness
        .topology
        .put_node(&harness.context, "b", &node("10.0.0.2", 3306, NodeRole::Slave, NodeStatus::Online))
        .await
        .unwrap();
    harness.topology.set_master_cas(&harness.context, None, "a").await.unwrap();

    harness.probe.set_health("10.0.0.1", 3306, HealthOutcome::Failed(mha_probe::FailureReason::Timeout));
    harness.probe.set_health("10.0.0.2", 3306, HealthOutcome::Online);
    harness.probe.set_replication(
        "10.0.0.2",
        3306,
        mha_probe::ReplicationStatus {
            io_running: true,
            sql_running: true,
            lag: Some(Duration::from_secs(0)),
            gtid: "x:1-10".to_string(),
        },
    );

    // First tick: `a` is not online, `b` is the only candidate, promotion happens.
    let report = harness.reconciler.tick(&harness.context).await.unwrap();
    assert_eq!(report.promoted.as_deref(), Some("b"));

    // Immediately after, `b` (the new master) has a transient probe failure. Still within
    // the grace period, so no re-election or clearing happens.
    harness.probe.set_health("10.0.0.2", 3306, HealthOutcome::Failed(mha_probe::FailureReason::Timeout));
    let report = harness.reconciler.tick(&harness.context).await.unwrap();
    assert!(report.promoted.is_none());
    assert_eq!(harness.topology.get_master(&harness.context).await.unwrap().as_deref(), Some("b"));
}

#[tokio::test]
async fn s_stale_prune_removes_old_master_record() {
    let mut harness = harness();
    let mut stale = node("10.0.0.9", 3306, NodeRole::Master, NodeStatus::Online);
    stale.last_seen = Some(Utc::now() - chrono::Duration::minutes(10));
    harness.topology.put_node(&harness.context, "z", &stale).await.unwrap();
    harness.topology.set_master_cas(&harness.context, None, "z").await.unwrap();

    let report = harness.reconciler.tick(&harness.context).await.unwrap();
    assert_eq!(report.nodes_pruned, 1);
    assert!(harness.topology.get_node(&harness.context, "z").await.unwrap().is_none());
    assert!(harness.topology.get_slave(&harness.context, "z").await.unwrap().is_none());
    assert!(harness.topology.get_master(&harness.context).await.unwrap().is_none());
}

#[tokio::test]
async fn idempotent_tick_leaves_routing_unchanged() {
    let mut harness = harness();
    harness
        .topology
        .put_node(&harness.context, "a", &node("10.0.0.1", 3306, NodeRole::Master, NodeStatus::Online))
        .await
        .unwrap();
    harness.topology.set_master_cas(&harness.context, None, "a").await.unwrap();
    harness.probe.set_health("10.0.0.1", 3306, HealthOutcome::Online);
    harness.probe.set_write_position("10.0.0.1", 3306, "x:1-5");

    harness.reconciler.tick(&harness.context).await.unwrap();
    let first = harness.proxy.publish_count();
    harness.reconciler.tick(&harness.context).await.unwrap();
    let second = harness.proxy.publish_count();
    assert_eq!(second, first + 1, "each tick still republishes, but to the same routing");
    assert_eq!(
        harness.proxy.last_publish().unwrap().master.unwrap().host,
        "10.0.0.1"
    );
}
