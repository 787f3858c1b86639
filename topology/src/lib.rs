//! Domain layer over the consensus store: node records, the master pointer, slave records.
mod records;
mod repository;

pub use self::records::MasterPointer;
pub use self::records::NodeRecord;
pub use self::records::NodeRole;
pub use self::records::NodeStatus;
pub use self::records::SlaveRecord;
pub use self::records::MASTER_KEY;
pub use self::records::NODES_PREFIX;
pub use self::records::SLAVES_PREFIX;
pub use self::repository::NodeLookup;
pub use self::repository::TopologyRepository;

#[cfg(test)]
mod tests {
    use mha_context::Context;
    use mha_store::Store;

    use super::NodeLookup;
    use super::NodeRecord;
    use super::NodeRole;
    use super::NodeStatus;
    use super::SlaveRecord;
    use super::TopologyRepository;

    fn node(host: &str, port: u16, role: NodeRole, status: NodeStatus) -> NodeRecord {
        NodeRecord {
            host: host.to_string(),
            port,
            role,
            status,
            last_seen: Some(chrono::Utc::now()),
            gtid_position: String::new(),
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn put_list_and_get_node() {
        let repo = TopologyRepository::new(Store::fixture());
        let context = Context::fixture();
        let record = node("10.0.0.1", 3306, NodeRole::Slave, NodeStatus::Online);
        repo.put_node(&context, "a", &record).await.unwrap();

        let ids = repo.list_nodes(&context).await.unwrap();
        assert_eq!(ids, vec!["a".to_string()]);

        let fetched = repo.get_node(&context, "a").await.unwrap().unwrap();
        assert_eq!(fetched.host, "10.0.0.1");
        assert_eq!(fetched.role, NodeRole::Slave);
    }

    #[tokio::test]
    async fn delete_node_removes_slave_mirror_too() {
        let repo = TopologyRepository::new(Store::fixture());
        let context = Context::fixture();
        repo.put_node(
            &context,
            "z",
            &node("10.0.0.9", 3306, NodeRole::Slave, NodeStatus::Online),
        )
        .await
        .unwrap();
        repo.put_slave(
            &context,
            "z",
            &SlaveRecord {
                master_node_id: "a".to_string(),
                replication_lag: 2,
            },
        )
        .await
        .unwrap();

        repo.delete_node(&context, "z").await.unwrap();
        assert!(repo.get_node(&context, "z").await.unwrap().is_none());
        assert!(repo.get_slave(&context, "z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn master_cas_from_absent_then_from_known_previous() {
        let repo = TopologyRepository::new(Store::fixture());
        let context = Context::fixture();
        assert!(repo.get_master(&context).await.unwrap().is_none());

        let outcome = repo.set_master_cas(&context, None, "a").await.unwrap();
        assert!(matches!(outcome, mha_store::TxnOutcome::Success));
        assert_eq!(repo.get_master(&context).await.unwrap().as_deref(), Some("a"));

        // A stale `expected_prev` loses the race.
        let outcome = repo.set_master_cas(&context, Some("stale"), "c").await.unwrap();
        assert!(matches!(outcome, mha_store::TxnOutcome::Failure));
        assert_eq!(repo.get_master(&context).await.unwrap().as_deref(), Some("a"));

        // The correct `expected_prev` succeeds.
        let outcome = repo.set_master_cas(&context, Some("a"), "c").await.unwrap();
        assert!(matches!(outcome, mha_store::TxnOutcome::Success));
        assert_eq!(repo.get_master(&context).await.unwrap().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn set_roles_updates_master_and_slaves() {
        let repo = TopologyRepository::new(Store::fixture());
        let context = Context::fixture();
        repo.put_node(&context, "a", &node("h1", 3306, NodeRole::Master, NodeStatus::Failed))
            .await
            .unwrap();
        repo.put_node(&context, "b", &node("h2", 3306, NodeRole::Slave, NodeStatus::Online))
            .await
            .unwrap();
        repo.put_node(&context, "c", &node("h3", 3306, NodeRole::Slave, NodeStatus::Online))
            .await
            .unwrap();

        repo.set_roles(&context, "c", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(repo.get_node(&context, "c").await.unwrap().unwrap().role, NodeRole::Master);
        assert_eq!(repo.get_node(&context, "a").await.unwrap().unwrap().role, NodeRole::Slave);
        assert_eq!(repo.get_node(&context, "b").await.unwrap().unwrap().role, NodeRole::Slave);
    }

    #[tokio::test]
    async fn malformed_record_is_reported_distinctly() {
        let store = Store::fixture();
        let context = Context::fixture();
        store.put(&context, "nodes/broken", b"not json".to_vec()).await.unwrap();

        let repo = TopologyRepository::new(store);
        match repo.lookup_node(&context, "broken").await.unwrap() {
            NodeLookup::Malformed => (),
            other => panic!("expected Malformed, got {:?}", other),
        }
        assert!(repo.get_node(&context, "broken").await.unwrap().is_none());
    }
}
