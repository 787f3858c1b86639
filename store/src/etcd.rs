//! [`StoreBackend`] implementation backed by an etcd cluster.
use anyhow::Context as AnyhowContext;
use anyhow::Result;
use etcd_client::Client;
use etcd_client::Compare;
use etcd_client::CompareOp;
use etcd_client::ConnectOptions;
use etcd_client::GetOptions;
use etcd_client::Txn;
use etcd_client::TxnOp;

use mha_context::Context;
use mha_errors::StoreUnavailable;

use crate::Predicate;
use crate::StoreBackend;
use crate::TxnOutcome;
use crate::WriteOp;

/// Wrap a transport-level etcd failure as a [`StoreUnavailable`], with `message` attached as
/// the operation that failed.
fn store_unavailable(message: &'static str, error: etcd_client::Error) -> anyhow::Error {
    StoreUnavailable::new(anyhow::Error::new(error).context(message)).into()
}

/// [`StoreBackend`] talking to a real etcd cluster over gRPC.
///
/// All keys given to [`Store`](crate::Store) are namespaced by joining them onto the
/// configured prefix; the prefix always ends with `/` so namespaces never collide on a
/// common string prefix (e.g. `cluster` and `cluster-2`).
pub struct EtcdStore {
    client: Client,
    namespace: String,
}

impl EtcdStore {
    /// Connect to the given etcd endpoints, authenticating with the provided credentials.
    pub async fn connect(
        endpoints: &[String],
        user: &str,
        password: &str,
        namespace: &str,
    ) -> Result<Self> {
        let options = ConnectOptions::new().with_user(user.to_string(), password.to_string());
        let client = Client::connect(endpoints, Some(options))
            .await
            .context("failed to connect to the consensus store")?;
        let namespace = normalise_namespace(namespace);
        Ok(EtcdStore { client, namespace })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn strip_namespace<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.namespace.as_str()).unwrap_or(key)
    }
}

fn normalise_namespace(namespace: &str) -> String {
    if namespace.is_empty() || namespace.ends_with('/') {
        namespace.to_string()
    } else {
        format!("{}/", namespace)
    }
}

fn compare_to_etcd(namespace: &str, predicate: &Predicate) -> Compare {
    match predicate {
        Predicate::ValueEquals { key, value } => Compare::value(
            format!("{}{}", namespace, key),
            CompareOp::Equal,
            value.clone(),
        ),
        Predicate::VersionEquals { key, version } => Compare::version(
            format!("{}{}", namespace, key),
            CompareOp::Equal,
            *version,
        ),
    }
}

fn write_to_etcd(namespace: &str, op: &WriteOp) -> TxnOp {
    match op {
        WriteOp::Put { key, value } => {
            TxnOp::put(format!("{}{}", namespace, key), value.clone(), None)
        }
        WriteOp::Delete { key } => TxnOp::delete(format!("{}{}", namespace, key), None),
    }
}

#[async_trait::async_trait]
impl StoreBackend for EtcdStore {
    async fn list_keys(&self, context: &Context, prefix: &str) -> Result<Vec<String>> {
        let mut client = self.client.kv_client();
        let key = self.namespaced(prefix);
        slog::trace!(context.logger, "Listing keys from store"; "prefix" => prefix);
        let options = GetOptions::new().with_prefix().with_keys_only();
        let response = client
            .get(key, Some(options))
            .await
            .map_err(|error| store_unavailable("failed to list keys from the consensus store", error))?;
        let keys = response
            .kvs()
            .iter()
            .filter_map(|kv| kv.key_str().ok())
            .map(|key| self.strip_namespace(key).to_string())
            .collect();
        Ok(keys)
    }

    async fn get(&self, context: &Context, key: &str) -> Result<Option<Vec<u8>>> {
        let mut client = self.client.kv_client();
        let full_key = self.namespaced(key);
        slog::trace!(context.logger, "Reading key from store"; "key" => key);
        let response = client
            .get(full_key, None)
            .await
            .map_err(|error| store_unavailable("failed to read key from the consensus store", error))?;
        let value = response.kvs().first().map(|kv| kv.value().to_vec());
        Ok(value)
    }

    async fn put(&self, context: &Context, key: &str, value: Vec<u8>) -> Result<()> {
        let mut client = self.client.kv_client();
        let full_key = self.namespaced(key);
        slog::trace!(context.logger, "Writing key to store"; "key" => key);
        client
            .put(full_key, value, None)
            .await
            .map_err(|error| store_unavailable("failed to write key to the consensus store", error))?;
        Ok(())
    }

    async fn delete(&self, context: &Context, key: &str) -> Result<()> {
        let mut client = self.client.kv_client();
        let full_key = self.namespaced(key);
        slog::trace!(context.logger, "Deleting key from store"; "key" => key);
        client
            .delete(full_key, None)
            .await
            .map_err(|error| store_unavailable("failed to delete key from the consensus store", error))?;
        Ok(())
    }

    async fn txn(
        &self,
        context: &Context,
        compare: Vec<Predicate>,
        on_success: Vec<WriteOp>,
        on_failure: Vec<WriteOp>,
    ) -> Result<TxnOutcome> {
        let mut client = self.client.kv_client();
        slog::trace!(context.logger, "Submitting compare-and-swap transaction to store");

        let compares: Vec<Compare> = compare
            .iter()
            .map(|predicate| compare_to_etcd(&self.namespace, predicate))
            .collect();
        let on_success: Vec<TxnOp> = on_success
            .iter()
            .map(|op| write_to_etcd(&self.namespace, op))
            .collect();
        let on_failure: Vec<TxnOp> = on_failure
            .iter()
            .map(|op| write_to_etcd(&self.namespace, op))
            .collect();

        let txn = Txn::new()
            .when(compares)
            .and_then(on_success)
            .or_else(on_failure);
        let response = client.txn(txn).await.map_err(|error| {
            store_unavailable("failed to submit compare-and-swap transaction to the consensus store", error)
        })?;
        if response.succeeded() {
            Ok(TxnOutcome::Success)
        } else {
            Ok(TxnOutcome::Failure)
        }
    }
}
