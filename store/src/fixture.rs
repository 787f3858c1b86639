//! Inefficient in-memory implementation of [`Store`](super::Store) for unit tests.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use anyhow::Result;

use mha_context::Context;

use super::Predicate;
use super::StoreBackend;
use super::TxnOutcome;
use super::WriteOp;

/// A stored value paired with the version it was last written at.
///
/// Version `0` is reserved to mean "absent" so [`Predicate::VersionEquals`] can express
/// "this key does not exist yet" the same way etcd does.
#[derive(Clone, Debug)]
struct Entry {
    value: Vec<u8>,
    version: i64,
}

/// In-memory implementation of [`StoreBackend`] for unit tests.
#[derive(Clone, Default)]
pub struct StoreFixture {
    inner: Arc<Mutex<BTreeMap<String, Entry>>>,
}

impl StoreFixture {
    fn access(&self) -> MutexGuard<BTreeMap<String, Entry>> {
        self.inner.lock().expect("StoreFixture state lock poisoned")
    }

    /// Current version of `key`, `0` if the key is absent. Exposed for tests that assert on
    /// CAS behaviour directly.
    pub fn version_of(&self, key: &str) -> i64 {
        self.access().get(key).map(|entry| entry.version).unwrap_or(0)
    }

    fn holds(state: &BTreeMap<String, Entry>, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::ValueEquals { key, value } => {
                state.get(key).map(|entry| &entry.value) == Some(value)
            }
            Predicate::VersionEquals { key, version } => {
                let current = state.get(key).map(|entry| entry.version).unwrap_or(0);
                current == *version
            }
        }
    }

    fn apply(state: &mut BTreeMap<String, Entry>, op: &WriteOp) {
        match op {
            WriteOp::Put { key, value } => {
                let version = state.get(key).map(|entry| entry.version).unwrap_or(0) + 1;
                state.insert(
                    key.clone(),
                    Entry {
                        value: value.clone(),
                        version,
                    },
                );
            }
            WriteOp::Delete { key } => {
                state.remove(key);
            }
        }
    }
}

#[async_trait::async_trait]
impl StoreBackend for StoreFixture {
    async fn list_keys(&self, _: &Context, prefix: &str) -> Result<Vec<String>> {
        let state = self.access();
        let keys = state
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        Ok(keys)
    }

    async fn get(&self, _: &Context, key: &str) -> Result<Option<Vec<u8>>> {
        let state = self.access();
        Ok(state.get(key).map(|entry| entry.value.clone()))
    }

    async fn put(&self, _: &Context, key: &str, value: Vec<u8>) -> Result<()> {
        let mut state = self.access();
        Self::apply(&mut state, &WriteOp::Put { key: key.to_string(), value });
        Ok(())
    }

    async fn delete(&self, _: &Context, key: &str) -> Result<()> {
        let mut state = self.access();
        state.remove(key);
        Ok(())
    }

    async fn txn(
        &self,
        _: &Context,
        compare: Vec<Predicate>,
        on_success: Vec<WriteOp>,
        on_failure: Vec<WriteOp>,
    ) -> Result<TxnOutcome> {
        let mut state = self.access();
        let holds = compare.iter().all(|predicate| Self::holds(&state, predicate));
        let branch = if holds { &on_success } else { &on_failure };
        for op in branch {
            Self::apply(&mut state, op);
        }
        Ok(if holds {
            TxnOutcome::Success
        } else {
            TxnOutcome::Failure
        })
    }
}

#[cfg(test)]
mod tests {
    use super::StoreFixture;
    use crate::Predicate;
    use crate::Store;
    use crate::TxnOutcome;
    use crate::WriteOp;
    use mha_context::Context;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = Store::from(StoreFixture::default());
        let context = Context::fixture();
        store.put(&context, "nodes/a", b"hello".to_vec()).await.unwrap();
        let value = store.get(&context, "nodes/a").await.unwrap();
        assert_eq!(value, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn version_cas_rejects_stale_precondition() {
        let fixture = StoreFixture::default();
        let store = Store::from(fixture.clone());
        let context = Context::fixture();

        // Absent key: version 0 precondition succeeds.
        let outcome = store
            .txn(
                &context,
                vec![Predicate::VersionEquals {
                    key: "topology/master".to_string(),
                    version: 0,
                }],
                vec![WriteOp::Put {
                    key: "topology/master".to_string(),
                    value: b"node-a".to_vec(),
                }],
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(outcome, TxnOutcome::Success);

        // Re-running the same absent-key CAS now loses, because the key exists.
        let outcome = store
            .txn(
                &context,
                vec![Predicate::VersionEquals {
                    key: "topology/master".to_string(),
                    version: 0,
                }],
                vec![WriteOp::Put {
                    key: "topology/master".to_string(),
                    value: b"node-b".to_vec(),
                }],
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(outcome, TxnOutcome::Failure);
        assert_eq!(
            store.get(&context, "topology/master").await.unwrap(),
            Some(b"node-a".to_vec())
        );
    }

    #[tokio::test]
    async fn value_cas_moves_pointer_when_expected_value_matches() {
        let store = Store::from(StoreFixture::default());
        let context = Context::fixture();
        store
            .put(&context, "topology/master", b"node-a".to_vec())
            .await
            .unwrap();

        let outcome = store
            .txn(
                &context,
                vec![Predicate::ValueEquals {
                    key: "topology/master".to_string(),
                    value: b"node-a".to_vec(),
                }],
                vec![WriteOp::Put {
                    key: "topology/master".to_string(),
                    value: b"node-c".to_vec(),
                }],
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(outcome, TxnOutcome::Success);
        assert_eq!(
            store.get(&context, "topology/master").await.unwrap(),
            Some(b"node-c".to_vec())
        );
    }

    #[tokio::test]
    async fn list_keys_filters_by_prefix() {
        let store = Store::from(StoreFixture::default());
        let context = Context::fixture();
        store.put(&context, "nodes/a", b"x".to_vec()).await.unwrap();
        store.put(&context, "nodes/b", b"y".to_vec()).await.unwrap();
        store
            .put(&context, "topology/slaves/a", b"z".to_vec())
            .await
            .unwrap();

        let mut keys = store.list_keys(&context, "nodes/").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["nodes/a".to_string(), "nodes/b".to_string()]);
    }
}
