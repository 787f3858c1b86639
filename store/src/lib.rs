//! Typed wrapper over the consensus key-value store backing the coordinator.
//!
//! ## An ergonomic interface
//!
//! The [`Store`] exposes the small, fixed set of operations the control loop needs —
//! list, get, put, delete and a compare-and-swap transaction — and defers the transport
//! concerns to a [`StoreBackend`] implementation. This mirrors the facade-over-trait-object
//! split the wider coordinator uses everywhere a backend is pluggable: callers depend on
//! [`Store`], tests depend on [`StoreFixture`], and only `main` ever names the concrete
//! backend.
//!
//! All operations are scoped under a namespace prefix supplied when the backend is
//! constructed; callers pass unprefixed keys such as `nodes/a` and the backend joins them
//! with the namespace before talking to the store.
//!
//! The client never retries a failed write — retrying, like abandoning a tick, is a
//! decision for the Reconciler to make, not this crate.
use std::sync::Arc;

use anyhow::Result;

use mha_context::Context;

mod etcd;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::StoreFixture;

pub use self::etcd::EtcdStore;

/// A predicate evaluated by [`Store::txn`] before choosing which branch to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// The key currently holds exactly this value.
    ValueEquals { key: String, value: Vec<u8> },

    /// The key is currently at exactly this version; `0` means the key is absent.
    VersionEquals { key: String, version: i64 },
}

/// A single write performed as part of a [`Store::txn`] branch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// Which branch of a [`Store::txn`] call ran.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxnOutcome {
    /// All predicates held; the `on_success` branch was applied.
    Success,

    /// At least one predicate failed; the `on_failure` branch was applied.
    Failure,
}

/// Query, write and atomically compare-and-swap state in the consensus store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<dyn StoreBackend>,
}

impl Store {
    /// List keys (relative to the namespace) that start with `prefix`, in store order.
    pub async fn list_keys(&self, context: &Context, prefix: &str) -> Result<Vec<String>> {
        self.inner.list_keys(context, prefix).await
    }

    /// Fetch the value stored at `key`, if present.
    pub async fn get(&self, context: &Context, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(context, key).await
    }

    /// Overwrite the value stored at `key`.
    pub async fn put(&self, context: &Context, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.put(context, key, value).await
    }

    /// Remove the value stored at `key`, if present.
    pub async fn delete(&self, context: &Context, key: &str) -> Result<()> {
        self.inner.delete(context, key).await
    }

    /// Atomically evaluate `compare` and apply `on_success` or `on_failure` accordingly.
    pub async fn txn(
        &self,
        context: &Context,
        compare: Vec<Predicate>,
        on_success: Vec<WriteOp>,
        on_failure: Vec<WriteOp>,
    ) -> Result<TxnOutcome> {
        self.inner
            .txn(context, compare, on_success, on_failure)
            .await
    }
}

impl<T> From<T> for Store
where
    T: StoreBackend + 'static,
{
    fn from(value: T) -> Self {
        Store {
            inner: Arc::new(value),
        }
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Store {
    /// Initialise an in-memory store backend for unit tests.
    pub fn fixture() -> Self {
        Store::from(StoreFixture::default())
    }
}

/// Transport-level operations a consensus store backend must implement.
///
/// Implementations only ever fail on transport errors: a lost compare-and-swap is not an
/// error, it is communicated as [`TxnOutcome::Failure`].
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    async fn list_keys(&self, context: &Context, prefix: &str) -> Result<Vec<String>>;
    async fn get(&self, context: &Context, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, context: &Context, key: &str, value: Vec<u8>) -> Result<()>;
    async fn delete(&self, context: &Context, key: &str) -> Result<()>;
    async fn txn(
        &self,
        context: &Context,
        compare: Vec<Predicate>,
        on_success: Vec<WriteOp>,
        on_failure: Vec<WriteOp>,
    ) -> Result<TxnOutcome>;
}
