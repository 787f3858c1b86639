//! Domain layer over [`Store`] enforcing the coordinator's record schema.
use anyhow::Result;

use mha_context::Context;
use mha_store::Predicate;
use mha_store::Store;
use mha_store::TxnOutcome;
use mha_store::WriteOp;

use crate::records::MasterPointer;
use crate::records::NodeRecord;
use crate::records::SlaveRecord;
use crate::records::MASTER_KEY;
use crate::records::NODES_PREFIX;
use crate::records::SLAVES_PREFIX;

/// Outcome of looking a [`NodeRecord`] up by id.
///
/// Distinguishes "never registered" from "registered but the JSON could not be parsed" so
/// callers can apply the spec's pruning rule for malformed records without re-parsing.
#[derive(Debug)]
pub enum NodeLookup {
    Found(NodeRecord),
    Malformed,
    Missing,
}

impl NodeLookup {
    pub fn into_option(self) -> Option<NodeRecord> {
        match self {
            NodeLookup::Found(record) => Some(record),
            NodeLookup::Malformed | NodeLookup::Missing => None,
        }
    }
}

/// Domain layer for reading and writing the coordinator's topology records.
#[derive(Clone)]
pub struct TopologyRepository {
    store: Store,
}

impl TopologyRepository {
    pub fn new(store: Store) -> Self {
        TopologyRepository { store }
    }

    /// List the ids of all registered nodes, derived from `ListKeys("nodes/")`.
    ///
    /// Keys with a sub-path under a node id (none exist in the current schema, but the
    /// store contract allows them) are excluded, matching `ListNodes`'s definition.
    pub async fn list_nodes(&self, context: &Context) -> Result<Vec<String>> {
        let keys = self.store.list_keys(context, NODES_PREFIX).await?;
        let ids = keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(NODES_PREFIX).map(String::from))
            .filter(|id| !id.contains('/') && !id.is_empty())
            .collect();
        Ok(ids)
    }

    /// Look a node up, distinguishing "missing" from "malformed" for callers that prune.
    pub async fn lookup_node(&self, context: &Context, id: &str) -> Result<NodeLookup> {
        let key = format!("{}{}", NODES_PREFIX, id);
        let value = self.store.get(context, &key).await?;
        let value = match value {
            None => return Ok(NodeLookup::Missing),
            Some(value) => value,
        };
        match serde_json::from_slice::<NodeRecord>(&value) {
            Ok(record) => Ok(NodeLookup::Found(record)),
            Err(error) => {
                slog::warn!(
                    context.logger, "Node record could not be parsed";
                    "node" => id, "error" => %error,
                );
                Ok(NodeLookup::Malformed)
            }
        }
    }

    /// Fetch a node record, treating missing and malformed records the same as "absent".
    pub async fn get_node(&self, context: &Context, id: &str) -> Result<Option<NodeRecord>> {
        Ok(self.lookup_node(context, id).await?.into_option())
    }

    /// Overwrite a node record atomically.
    pub async fn put_node(&self, context: &Context, id: &str, record: &NodeRecord) -> Result<()> {
        let key = format!("{}{}", NODES_PREFIX, id);
        let value = serde_json::to_vec(record)?;
        self.store.put(context, &key, value).await
    }

    /// Delete a node record and its mirrored slave record, used for pruning.
    pub async fn delete_node(&self, context: &Context, id: &str) -> Result<()> {
        let key = format!("{}{}", NODES_PREFIX, id);
        self.store.delete(context, &key).await?;
        self.delete_slave(context, id).await
    }

    /// Read the current master pointer, if one is set.
    pub async fn get_master(&self, context: &Context) -> Result<Option<MasterPointer>> {
        let value = self.store.get(context, MASTER_KEY).await?;
        Ok(value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Atomically move the master pointer from `expected_prev` to `new`.
    ///
    /// `expected_prev = None` requires the pointer to currently be absent (`version(key) ==
    /// 0`); `Some(id)` requires the pointer to currently hold exactly that value.
    pub async fn set_master_cas(
        &self,
        context: &Context,
        expected_prev: Option<&str>,
        new: &str,
    ) -> Result<TxnOutcome> {
        let compare = match expected_prev {
            None => vec![Predicate::VersionEquals {
                key: MASTER_KEY.to_string(),
                version: 0,
            }],
            Some(prev) => vec![Predicate::ValueEquals {
                key: MASTER_KEY.to_string(),
                value: prev.as_bytes().to_vec(),
            }],
        };
        let on_success = vec![WriteOp::Put {
            key: MASTER_KEY.to_string(),
            value: new.as_bytes().to_vec(),
        }];
        self.store.txn(context, compare, on_success, vec![]).await
    }

    /// Clear the master pointer unconditionally.
    pub async fn clear_master(&self, context: &Context) -> Result<()> {
        self.store.delete(context, MASTER_KEY).await
    }

    /// Apply the outcome of a successful promotion: the new master's role and every other
    /// node's role. Best-effort per-key; the master pointer CAS is the authoritative
    /// serialisation point, so a later tick reconciles any divergence left by a partial
    /// failure here.
    pub async fn set_roles(
        &self,
        context: &Context,
        master: &str,
        slaves: &[String],
    ) -> Result<()> {
        if let Some(mut record) = self.get_node(context, master).await? {
            record.role = crate::records::NodeRole::Master;
            self.put_node(context, master, &record).await?;
        }
        for slave in slaves {
            if let Some(mut record) = self.get_node(context, slave).await? {
                record.role = crate::records::NodeRole::Slave;
                self.put_node(context, slave, &record).await?;
            }
        }
        Ok(())
    }

    /// Read the informational slave record for a node, if any.
    pub async fn get_slave(&self, context: &Context, id: &str) -> Result<Option<SlaveRecord>> {
        let key = format!("{}{}", SLAVES_PREFIX, id);
        let value = self.store.get(context, &key).await?;
        Ok(value.and_then(|bytes| serde_json::from_slice(&bytes).ok()))
    }

    /// Overwrite the informational slave record for a node.
    pub async fn put_slave(&self, context: &Context, id: &str, record: &SlaveRecord) -> Result<()> {
        let key = format!("{}{}", SLAVES_PREFIX, id);
        let value = serde_json::to_vec(record)?;
        self.store.put(context, &key, value).await
    }

    /// Delete the informational slave record for a node, if any.
    pub async fn delete_slave(&self, context: &Context, id: &str) -> Result<()> {
        let key = format!("{}{}", SLAVES_PREFIX, id);
        self.store.delete(context, &key).await
    }
}
