//! Process-local named locks.
//!
//! Resources that mutate a shared remote document (a Logic App Workflow's
//! actions and triggers, for instance) serialize on a lock named after the
//! parent resource. The locks are per process: two provider processes
//! touching the same workflow are not coordinated.
//!
//! ```
//! # tokio_test::block_on(async {
//! use azurerm_provider_core::locks::LockManager;
//!
//! let locks = LockManager::new();
//! let guard = locks.by_name("wf1", "azurerm_logic_app").await;
//! assert_eq!(guard.key(), "azurerm_logic_app.wf1");
//! drop(guard);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// A registry of named mutexes, shared by cloning.
///
/// Acquisition blocks until the lock is free; there is no timeout here.
///
/// Entries are never removed: every name ever locked keeps its mutex for the
/// life of the registry. That is one small entry per workflow touched, which
/// is bounded by the workflows a provider process manages.
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl LockManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `name` within `resource_type`.
    ///
    /// The lock is released when the returned guard is dropped, on every exit
    /// path including `?` returns and unwinding.
    pub async fn by_name(&self, name: &str, resource_type: &str) -> NamedLockGuard {
        let key = format!("{}.{}", resource_type, name);
        let mutex = self.entry(&key);

        debug!(lock = %key, "acquiring lock");
        let guard = mutex.lock_owned().await;
        debug!(lock = %key, "acquired lock");

        NamedLockGuard { key, _guard: guard }
    }

    /// Whether the lock for `name` within `resource_type` is currently held.
    pub fn is_locked(&self, name: &str, resource_type: &str) -> bool {
        let key = format!("{}.{}", resource_type, name);
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .get(&key)
            .map(|mutex| mutex.try_lock().is_err())
            .unwrap_or(false)
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        // the registry only holds Arcs, so a poisoned map is still consistent
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// Holds a named lock until dropped.
#[derive(Debug)]
pub struct NamedLockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl NamedLockGuard {
    /// The registry key, `"{resource_type}.{name}"`.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        debug!(lock = %self.key, "releasing lock");
    }
}
