//! Logging handle.
//!
//! No process-wide subscriber is ever installed. The entry point builds a
//! [`LogHandle`] and hands clones to the components that log; each component
//! runs its work inside [`LogHandle::in_scope`], so `tracing` macros in that
//! work reach the injected subscriber. [`LogHandle::install`] makes a handle
//! the default for the calling thread until the returned guard drops, which is
//! the explicit shutdown point.

use tracing::{dispatcher::DefaultGuard, Dispatch};
use tracing_subscriber::EnvFilter;

/// Cloneable handle to a `tracing` subscriber.
#[derive(Clone, Debug)]
pub struct LogHandle {
    dispatch: Dispatch,
}

/// Keeps a handle installed on the current thread; dropping it restores the
/// previous default.
#[must_use = "dropping the guard uninstalls the logger"]
pub struct LogGuard {
    _guard: DefaultGuard,
}

impl LogHandle {
    /// Formatted logger filtered by `RUST_LOG`, or by `default_filter` when
    /// the variable is unset.
    pub fn new(default_filter: &str) -> anyhow::Result<Self> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(default_filter)?,
        };
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        Ok(Self {
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// Logger that writes through the test harness capture.
    pub fn for_tests() -> Self {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_test_writer()
            .finish();
        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    /// Logger that discards everything.
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Runs `f` with this handle as the active subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Installs this handle on the current thread until the guard drops.
    pub fn install(&self) -> LogGuard {
        LogGuard {
            _guard: tracing::dispatcher::set_default(&self.dispatch),
        }
    }
}

impl Default for LogHandle {
    fn default() -> Self {
        Self::disabled()
    }
}
