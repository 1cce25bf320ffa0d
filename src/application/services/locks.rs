//! Per-workspace lease map.
//!
//! Lifecycle operations on the same workspace id must not interleave at the
//! engine level (a launch racing a delete, say), so every operation holds the
//! id's lease for its duration. Operations on different ids proceed with no
//! coordination, since each addresses disjoint container/volume names.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Map of workspace id → lease. Entries are created on first use and pruned
/// once no operation holds or waits on them.
#[derive(Default)]
pub struct WorkspaceLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl WorkspaceLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lease for `workspace_id`, waiting for any holder to finish.
    pub async fn acquire(&self, workspace_id: &str) -> OwnedMutexGuard<()> {
        let lease = {
            let mut map = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(
                map.entry(workspace_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lease.lock_owned().await
    }

    /// Drop the lease entry for `workspace_id` if nobody holds or awaits it.
    /// Called after delete so the map does not grow with dead ids.
    pub fn prune(&self, workspace_id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if map
            .get(workspace_id)
            .is_some_and(|lease| Arc::strong_count(lease) == 1)
        {
            map.remove(workspace_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
