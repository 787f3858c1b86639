//! The [`Context`] is a general purpose immutable container to carry scoped values around.
//!
//! Code executed as part of a reconciliation tick can access tick-scoped values without
//! threading extra function arguments everywhere.
//!
//! Contexts are organised into a tree structure:
//!
//! - A root context represents the process-wide scope, created once at startup.
//! - Derived contexts represent a narrower scope within their parent with additional or
//!   updated information attached, such as the current tick id.
use slog::Logger;
use slog::OwnedKV;
use slog::SendSyncRefUnwindSafeKV;

/// The [`Context`] is a general purpose container to carry scoped values around.
///
/// Refer to the [crate level docs](crate) for details.
#[derive(Clone, Debug)]
pub struct Context {
    /// Logger with contextual attributes attached to it.
    pub logger: Logger,
}

impl Context {
    /// Derive a new [`Context`] by making changes to the current one.
    pub fn derive(&self) -> ContextBuilder {
        ContextBuilder {
            logger: self.logger.clone(),
        }
    }

    /// Derive a new [`Context`] by making changes to the current one using the provided callback.
    pub fn derive_with<F>(&self, callback: F) -> Context
    where
        F: FnOnce(ContextBuilder) -> ContextBuilder,
    {
        let builder = callback(self.derive());
        builder.build()
    }

    /// Initialise a new root context with no values attached.
    pub fn root(logger: Logger) -> ContextBuilder {
        ContextBuilder { logger }
    }
}

/// A builder for root and derived contexts.
pub struct ContextBuilder {
    logger: Logger,
}

impl ContextBuilder {
    /// Finalise the build process and return a new [`Context`].
    pub fn build(self) -> Context {
        Context {
            logger: self.logger,
        }
    }

    /// Update the [`Context`] logger to attach new log key/value pairs.
    pub fn log_values<T>(mut self, entries: OwnedKV<T>) -> Self
    where
        T: SendSyncRefUnwindSafeKV + 'static,
    {
        self.logger = self.logger.new(entries);
        self
    }

    /// Attach the current reconciliation tick id, so every log record emitted while this
    /// context is in scope can be correlated back to the tick that produced it.
    pub fn tick_id(self, id: u64) -> Self {
        self.log_values(slog::o!("tick_id" => id))
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Context {
    /// Create an empty context useful for tests.
    pub fn fixture() -> Context {
        let logger = Logger::root(slog::Discard, slog::o!());
        Context { logger }
    }
}
