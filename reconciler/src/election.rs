//! Failover candidate selection: the pure decision function behind S5.
use std::cmp::Ordering;

use mha_probe::compare_gtid;
use mha_probe::GtidOrder;

use crate::observation::NodeObservation;

/// Pick a replacement master from `candidates`, ranking by `CompareGTID` (more advanced
/// wins) and breaking ties by the lexicographically smaller `node_id`.
///
/// Returns `None` when `candidates` is empty; the caller logs and retries next tick.
pub fn elect<'a>(candidates: &'a [(String, NodeObservation)]) -> Option<&'a (String, NodeObservation)> {
    candidates.iter().max_by(|(id_a, obs_a), (id_b, obs_b)| {
        match compare_gtid(&obs_a.gtid_position, &obs_b.gtid_position) {
            GtidOrder::Ahead => Ordering::Greater,
            GtidOrder::Behind => Ordering::Less,
            GtidOrder::Equal => id_b.cmp(id_a),
        }
    })
}

#[cfg(test)]
mod tests {
    use mha_topology::NodeRole;
    use mha_topology::NodeStatus;

    use super::elect;
    use crate::observation::NodeObservation;

    fn candidate(id: &str, gtid: &str) -> (String, NodeObservation) {
        (
            id.to_string(),
            NodeObservation {
                host: "h".to_string(),
                port: 3306,
                role: NodeRole::Slave,
                status: NodeStatus::Online,
                gtid_position: gtid.to_string(),
            },
        )
    }

    #[test]
    fn most_advanced_gtid_wins() {
        let candidates = vec![candidate("b", "x:1-100"), candidate("c", "x:1-120")];
        let winner = elect(&candidates).unwrap();
        assert_eq!(winner.0, "c");
    }

    #[test]
    fn ties_broken_by_lexicographically_smaller_id() {
        let candidates = vec![candidate("z", "x:1-50"), candidate("a", "x:1-50")];
        let winner = elect(&candidates).unwrap();
        assert_eq!(winner.0, "a");
    }

    #[test]
    fn empty_slate_has_no_winner() {
        let candidates: Vec<(String, NodeObservation)> = vec![];
        assert!(elect(&candidates).is_none());
    }
}
