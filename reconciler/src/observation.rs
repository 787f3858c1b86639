//! What the health sweep learned about a node during the current tick.
use mha_topology::NodeRole;
use mha_topology::NodeStatus;

/// The freshest view of a node this tick, used by election and routing publish instead of
/// re-reading the store: the store write in S4 only happens when status changes, but the
/// control loop's own decisions always act on what was just probed.
#[derive(Clone, Debug)]
pub struct NodeObservation {
    pub host: String,
    pub port: u16,
    pub role: NodeRole,
    pub status: NodeStatus,
    pub gtid_position: String,
}

impl NodeObservation {
    pub fn is_online(&self) -> bool {
        matches!(self.status, NodeStatus::Online)
    }

    pub fn is_online_slave(&self) -> bool {
        self.is_online() && matches!(self.role, NodeRole::Slave)
    }
}
