//! The record types stored under the coordinator's keyspace.
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Prefix all [`NodeRecord`]s are stored under.
pub const NODES_PREFIX: &str = "nodes/";

/// Key the [`MasterPointer`](crate::repository::TopologyRepository::get_master) is stored at.
pub const MASTER_KEY: &str = "topology/master";

/// Prefix all [`SlaveRecord`]s are stored under.
pub const SLAVES_PREFIX: &str = "topology/slaves/";

/// Role a node currently plays in the topology.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Slave,
    #[serde(rename = "")]
    #[default]
    None,
}

/// Health status of a node as last observed by the Reconciler.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Failed,
    #[default]
    Unknown,
}

/// A registered database node, keyed `nodes/<node_id>`.
///
/// Unknown fields are preserved in `extra` rather than dropped, so a coordinator running an
/// older version of this schema does not destroy data written by a newer one (or vice
/// versa) when it rewrites the record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub host: String,

    #[serde(with = "port_repr")]
    pub port: u16,

    #[serde(default)]
    pub role: NodeRole,

    #[serde(default)]
    pub status: NodeStatus,

    /// Absent when a node has registered but never been observed by a probe.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,

    #[serde(default)]
    pub gtid_position: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NodeRecord {
    /// Whether `host`/`port` are present and well-formed enough to attempt a probe.
    pub fn has_valid_address(&self) -> bool {
        !self.host.is_empty() && self.port > 0
    }
}

/// The `node_id` of the current master, keyed `topology/master`.
///
/// Stored as plain UTF-8 text rather than JSON, per the keyspace contract.
pub type MasterPointer = String;

/// Informational mirror of replication state, keyed `topology/slaves/<node_id>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlaveRecord {
    pub master_node_id: String,
    pub replication_lag: i64,
}

/// (De)serialise a port as either a JSON string or a JSON number, per the data model.
mod port_repr {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    pub fn serialize<S>(port: &u16, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(*port)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u16, D::Error>
    where
        D: Deserializer<'de>,
    {
        match PortRepr::deserialize(deserializer)? {
            PortRepr::Number(port) => Ok(port),
            PortRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}
