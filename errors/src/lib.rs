//! Shared error taxonomy for the coordinator.
//!
//! Each variant below corresponds to one of the error kinds named by the control loop's
//! error handling design that actually crosses a crate boundary as a typed error.
//! `ConfigInvalid` is fatal at startup; `StoreUnavailable` and `ProxyUnavailable` are
//! recoverable and handled by the Reconciler on a per-tick basis, never escaping a tick
//! boundary.
//!
//! Conditions that are part of normal control flow rather than failures — a lost
//! compare-and-swap, a malformed record, a degraded replica, a failed or unreachable node
//! probe — are modelled as plain return values by the crates that detect them (`TxnOutcome`,
//! `NodeLookup`, `HealthOutcome`/`FailureReason`), not as members of this taxonomy: a single
//! node being unreachable must never fail the tick, so it is data the Reconciler branches on
//! rather than an error it propagates.

/// Configuration supplied to the process is not valid.
///
/// Fatal: the process exits with a non-zero status rather than retrying.
#[derive(Debug, thiserror::Error)]
#[error("configuration is invalid: {reason}")]
pub struct ConfigInvalid {
    pub reason: String,
}

impl ConfigInvalid {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        ConfigInvalid {
            reason: reason.into(),
        }
    }
}

/// The consensus store could not be reached or returned a transport-level failure.
///
/// Recoverable: the current tick is abandoned and retried on the next tick.
#[derive(Debug, thiserror::Error)]
#[error("the consensus store is unavailable")]
pub struct StoreUnavailable {
    #[source]
    pub source: anyhow::Error,
}

impl StoreUnavailable {
    pub fn new(source: anyhow::Error) -> Self {
        StoreUnavailable { source }
    }
}

/// The proxy's administration interface could not be reached or a batch failed to commit.
///
/// Recoverable: logged and retried on the next tick.
#[derive(Debug, thiserror::Error)]
#[error("the proxy administration interface is unavailable")]
pub struct ProxyUnavailable {
    #[source]
    pub source: anyhow::Error,
}

impl ProxyUnavailable {
    pub fn new(source: anyhow::Error) -> Self {
        ProxyUnavailable { source }
    }
}
